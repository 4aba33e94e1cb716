use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::commands::Workspace;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, format_tags, print_json};

#[derive(Parser)]
pub struct ShowCommand {
    #[clap(help = "Key point ID (e.g. kpt_001)")]
    pub id: String,
}

impl ShowCommand {
    pub fn execute(&self, workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        let playbook = workspace.store.load();
        let kp = playbook
            .get(&self.id)
            .ok_or_else(|| CliError::UnknownKeyPoint(self.id.clone()))?;

        match format {
            OutputFormat::Json => print_json(kp)?,
            OutputFormat::Table => {
                let signals = &kp.signals;
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Field", "Value"]);

                table.add_row(["ID", kp.id.as_str()]);
                table.add_row(["Text", kp.text.as_str()]);
                table.add_row(["Score", &kp.score.to_string()]);
                table.add_row(["Tags", &format_tags(&kp.tags)]);
                table.add_row(["Pending", if kp.pending { "yes" } else { "no" }]);
                table.add_row(["Effect", &format!("{:.2}", signals.effect_rating)]);
                table.add_row(["Risk", &format!("{:.2}", signals.risk_level)]);
                table.add_row(["Innovation", &format!("{:.2}", signals.innovation_level)]);

                println!("{table}");
            }
        }

        Ok(())
    }
}
