use std::path::PathBuf;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use playbook::extraction::{Extractor, JsonFileExtractor};
use playbook::memory::MergeEngine;

use crate::commands::Workspace;
use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
pub struct MergeCommand {
    #[clap(help = "Extraction result file (JSON)")]
    pub file: PathBuf,

    #[clap(long, help = "Show the merge outcome without saving")]
    pub dry_run: bool,
}

impl MergeCommand {
    pub fn execute(&self, workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        let mut playbook = workspace.store.load();
        let result = JsonFileExtractor::new(&self.file).extract(&playbook)?;

        let engine = MergeEngine::new(workspace.config.merge_policy()?);
        let report = engine.merge(&mut playbook, &result);

        if !self.dry_run {
            workspace.store.save(&mut playbook)?;
        }

        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "dry_run": self.dry_run,
                "report": report,
            }))?,
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Outcome", "Count"]);

                table.add_row(["Evaluations applied", &report.evaluations_applied.to_string()]);
                table.add_row(["Added", &report.added.to_string()]);
                table.add_row(["Merged", &report.merged.to_string()]);
                table.add_row(["Preserved", &report.preserved.to_string()]);
                table.add_row(["Evicted (floor)", &report.evicted_below_floor.to_string()]);
                table.add_row(["Evicted (cap)", &report.evicted_over_cap.to_string()]);
                table.add_row(["Total", &report.total.to_string()]);

                println!("Merge mode: {:?}", report.mode);
                println!("{table}");
                if self.dry_run {
                    println!("\nDry run: {} left unchanged", workspace.store.path().display());
                } else {
                    println!("\nSaved to {}", workspace.store.path().display());
                }
            }
        }

        Ok(())
    }
}
