use std::collections::BTreeMap;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use playbook::memory::Playbook;
use serde::Serialize;

use crate::commands::Workspace;
use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
pub struct StatsCommand {
    #[clap(
        long,
        default_value = "10",
        help = "Number of most frequent tags to show"
    )]
    pub top_tags: usize,
}

/// Summary figures for one playbook
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct PlaybookStats {
    pub total: usize,
    pub stable: usize,
    pub pending: usize,
    pub min_score: Option<i64>,
    pub max_score: Option<i64>,
    pub high_confidence: usize,
    pub recommendation: usize,
    pub top_tags: Vec<(String, usize)>,
}

impl PlaybookStats {
    pub fn compute(playbook: &Playbook, high_confidence_threshold: i64, top_tags: usize) -> Self {
        let mut tag_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for tag in playbook.key_points.iter().flat_map(|kp| kp.tags.iter()) {
            *tag_counts.entry(tag.as_str()).or_default() += 1;
        }
        let mut ranked_tags: Vec<(String, usize)> = tag_counts
            .into_iter()
            .map(|(tag, count)| (tag.to_string(), count))
            .collect();
        // BTreeMap order makes ties alphabetical; the sort is stable
        ranked_tags.sort_by(|a, b| b.1.cmp(&a.1));
        ranked_tags.truncate(top_tags);

        let high_confidence = playbook
            .key_points
            .iter()
            .filter(|kp| kp.score >= high_confidence_threshold)
            .count();
        let pending = playbook.pending().count();

        Self {
            total: playbook.len(),
            stable: playbook.len() - pending,
            pending,
            min_score: playbook.key_points.iter().map(|kp| kp.score).min(),
            max_score: playbook.key_points.iter().map(|kp| kp.score).max(),
            high_confidence,
            recommendation: playbook.len() - high_confidence,
            top_tags: ranked_tags,
        }
    }
}

impl StatsCommand {
    pub fn execute(&self, workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        let playbook = workspace.store.load();
        let threshold = workspace.config.retrieval.high_confidence_threshold;
        let stats = PlaybookStats::compute(&playbook, threshold, self.top_tags);

        match format {
            OutputFormat::Json => print_json(&stats)?,
            OutputFormat::Table => {
                println!("Playbook Statistics");
                println!("===================\n");
                println!("Location: {}", workspace.store.path().display());
                if let Some(updated) = &playbook.last_updated {
                    println!("Last updated: {updated}");
                }
                println!();

                let score_range = match (stats.min_score, stats.max_score) {
                    (Some(min), Some(max)) => format!("{min} .. {max}"),
                    _ => "-".to_string(),
                };

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Metric", "Value"]);
                table.add_row(["Total", &stats.total.to_string()]);
                table.add_row(["Stable", &stats.stable.to_string()]);
                table.add_row(["Pending", &stats.pending.to_string()]);
                table.add_row(["Score range", &score_range]);
                table.add_row([
                    &format!("High confidence (score >= {threshold})"),
                    &stats.high_confidence.to_string(),
                ]);
                table.add_row(["Recommendation", &stats.recommendation.to_string()]);
                println!("{table}\n");

                if !stats.top_tags.is_empty() {
                    let mut tags = Table::new();
                    tags.load_preset(UTF8_FULL_CONDENSED)
                        .set_content_arrangement(ContentArrangement::Dynamic)
                        .set_header(["Tag", "Key points"]);
                    for (tag, count) in &stats.top_tags {
                        tags.add_row([tag.as_str(), &count.to_string()]);
                    }
                    println!("{tags}");
                }
            }
        }

        Ok(())
    }
}
