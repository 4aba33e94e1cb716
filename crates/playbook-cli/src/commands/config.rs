use clap::{Parser, Subcommand};

use crate::commands::Workspace;
use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[clap(about = "Show the effective configuration")]
    Show,
}

impl ConfigCommand {
    pub fn execute(&self, workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        match self.command {
            ConfigSubcommand::Show => Self::show(workspace, format),
        }
    }

    fn show(workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        let config = &workspace.config;
        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "playbook_path": workspace.store.path(),
                "config": config,
            }))?,
            OutputFormat::Table => {
                println!("# playbook: {}", workspace.store.path().display());
                println!("{}", toml::to_string_pretty(config)?);
            }
        }
        Ok(())
    }
}
