use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use playbook::injection::{format_context, load_template, truncate_to_budget};
use playbook::memory::tags::prepare_query;
use playbook::memory::{Ranker, SelectionRequest};

use crate::commands::Workspace;
use crate::error::CliResult;
use crate::output::{OutputFormat, print_json, truncate_string};

#[derive(Parser)]
pub struct SelectCommand {
    #[clap(long, value_delimiter = ',', help = "Tags to match (comma separated)")]
    pub tags: Vec<String>,

    #[clap(
        long,
        value_delimiter = ',',
        help = "Tags inferred from the prompt (comma separated)"
    )]
    pub prompt_tags: Vec<String>,

    #[clap(long, short, help = "Maximum key points to select")]
    pub limit: Option<usize>,

    #[clap(long, short, help = "0.0 favours proven knowledge, 1.0 exploration")]
    pub temperature: Option<f64>,

    #[clap(long, help = "Print the rendered context block instead")]
    pub context: bool,
}

impl SelectCommand {
    pub fn execute(&self, workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        let config = &workspace.config;
        let playbook = workspace.store.load();
        let ranker = Ranker::new(config.ranker_config());

        let limit = self.limit.unwrap_or(config.retrieval.default_limit);
        let temperature = self
            .temperature
            .unwrap_or(config.retrieval.default_temperature);
        let request = SelectionRequest::new(self.tags.clone(), limit)
            .with_prompt_tags(self.prompt_tags.clone())
            .with_temperature(temperature);
        let selection = ranker.select(&playbook, &request);

        if self.context {
            let selection = truncate_to_budget(&selection, config.injection.max_tokens);
            let template = load_template(config.injection.template.as_deref());
            let rendered = format_context(&selection, &prepare_query(&self.tags), &template);
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "context": rendered }))?,
                OutputFormat::Table => println!("{rendered}"),
            }
            return Ok(());
        }

        match format {
            OutputFormat::Json => print_json(&selection)?,
            OutputFormat::Table => {
                if selection.is_empty() {
                    println!("No matching key points.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["#", "ID", "Layer", "Weight", "Coverage", "Score", "Text"]);

                for (idx, ranked) in selection.iter().enumerate() {
                    let kp = ranked.key_point;
                    let rank = (idx + 1).to_string();
                    table.add_row([
                        rank.as_str(),
                        kp.id.as_str(),
                        &ranked.ranking.layer.to_string(),
                        &format!("{:.2}", ranked.ranking.weight),
                        &ranked.ranking.coverage.to_string(),
                        &kp.score.to_string(),
                        &truncate_string(&kp.text, 50),
                    ]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }
}
