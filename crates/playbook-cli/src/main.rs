use std::path::PathBuf;

use clap::{Parser, Subcommand};
use playbook_cli::commands::{
    ConfigCommand, ListCommand, MergeCommand, SelectCommand, ShowCommand, StatsCommand, Workspace,
};
use playbook_cli::error::CliResult;
use playbook_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "playbook-cli")]
#[command(about = "Playbook CLI - Management tool for playbook knowledge stores")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(long, short = 'p', global = true, help = "Path to playbook document")]
    pub playbook: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "List key points")]
    List(ListCommand),

    #[clap(about = "Show key point details")]
    Show(ShowCommand),

    #[clap(about = "Rank key points for a set of tags")]
    Select(SelectCommand),

    #[clap(about = "Merge an extraction result into the playbook")]
    Merge(MergeCommand),

    #[clap(about = "Show playbook statistics")]
    Stats(StatsCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

fn main() {
    init_logging();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let workspace = Workspace::open(cli.config.as_deref(), cli.playbook.clone())?;

    match &cli.command {
        Command::List(cmd) => cmd.execute(&workspace, format),
        Command::Show(cmd) => cmd.execute(&workspace, format),
        Command::Select(cmd) => cmd.execute(&workspace, format),
        Command::Merge(cmd) => cmd.execute(&workspace, format),
        Command::Stats(cmd) => cmd.execute(&workspace, format),
        Command::Config(cmd) => cmd.execute(&workspace, format),
    }
}
