use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::commands::Workspace;
use crate::error::CliResult;
use crate::output::{OutputFormat, format_tags, print_json, truncate_string};

#[derive(Parser)]
pub struct ListCommand {
    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of key points to display"
    )]
    pub limit: usize,

    #[clap(long, help = "Show only pending key points")]
    pub pending: bool,

    #[clap(long, short, help = "Show only key points carrying this tag")]
    pub tag: Option<String>,
}

impl ListCommand {
    pub fn execute(&self, workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        let playbook = workspace.store.load();
        let tag = self.tag.as_deref().map(|t| t.trim().to_lowercase());

        let key_points: Vec<_> = playbook
            .key_points
            .iter()
            .filter(|kp| !self.pending || kp.pending)
            .filter(|kp| tag.as_ref().is_none_or(|t| kp.tags.contains(t)))
            .take(self.limit)
            .collect();

        match format {
            OutputFormat::Json => print_json(&key_points)?,
            OutputFormat::Table => {
                if key_points.is_empty() {
                    println!("No key points found.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["ID", "Score", "Tags", "Pending", "Text"]);

                for kp in &key_points {
                    table.add_row([
                        kp.id.as_str(),
                        &kp.score.to_string(),
                        &format_tags(&kp.tags),
                        if kp.pending { "yes" } else { "" },
                        &truncate_string(&kp.text, 60),
                    ]);
                }

                println!("{table}");
                println!("\nShowing {} of {} key points", key_points.len(), playbook.len());
            }
        }

        Ok(())
    }
}
