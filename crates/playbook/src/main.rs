//! Playbook Hook - host hook protocol entry point
//!
//! Reads one JSON payload from stdin. Logs go to stderr because stdout
//! carries the hook response.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use playbook::config::{Config, load_config};
use playbook::diagnostics::DiagnosticSink;
use playbook::error::Result;
use playbook::extraction::{CommandExtractor, Extractor, JsonFileExtractor};
use playbook::hooks::{
    HookOutput, InjectInput, UpdateInput, build_context, parse_input, should_update,
    update_playbook,
};
use playbook::injection::load_template;
use playbook::memory::{MergeEngine, Ranker};
use playbook::storage::PlaybookStore;

/// Playbook hook - injects and updates scored project knowledge
#[derive(Parser)]
#[command(name = "playbook-hook")]
#[command(about = "Host hook that injects and updates playbook knowledge")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add relevant key points to a submitted prompt
    Inject,
    /// Merge an extraction result into the playbook
    Update {
        /// Extraction result file (default: run the configured extractor command)
        #[arg(long)]
        result: Option<PathBuf>,
        /// Invoked before context compaction; skips session-end gating
        #[arg(long)]
        precompact: bool,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Inject => {
            // The host must always receive a response
            let output = match inject(cli.config) {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!("Inject failed: {e}");
                    HookOutput::empty()
                }
            };
            println!("{}", output.to_json());
        }
        Command::Update { result, precompact } => {
            if let Err(e) = update(cli.config, result, precompact) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,playbook=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_stdin() -> Result<String> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw)?;
    Ok(raw)
}

fn store_for(config: &Config) -> PlaybookStore {
    PlaybookStore::new(config.playbook_path())
        .with_max_tags(config.limits.max_tags)
        .with_eviction_floor(config.limits.eviction_floor)
}

fn inject(config_path: Option<PathBuf>) -> Result<HookOutput> {
    let config = load_config(config_path.as_deref())?;
    let input: InjectInput = parse_input(&read_stdin()?)?;

    let playbook = store_for(&config).load();
    let ranker = Ranker::new(config.ranker_config());
    let template = load_template(config.injection.template.as_deref());
    let outcome = build_context(&input, &playbook, &ranker, &config, &template);

    let sink = DiagnosticSink::from_config(&config);
    if sink.is_enabled() {
        sink.record("user_prompt_inject", &serde_json::to_string_pretty(&outcome)?);
    }

    Ok(HookOutput::prompt_context(outcome.context))
}

fn update(config_path: Option<PathBuf>, result: Option<PathBuf>, precompact: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let input: UpdateInput = parse_input(&read_stdin()?)?;

    if !should_update(input.reason.as_deref(), &config.hooks, precompact) {
        tracing::info!(
            "Skipping playbook update for reason {:?}",
            input.reason.unwrap_or_default()
        );
        return Ok(());
    }

    let extractor: Box<dyn Extractor> = match result {
        Some(path) => Box::new(JsonFileExtractor::new(path)),
        None if !config.hooks.extractor_command.is_empty() => Box::new(
            CommandExtractor::new(config.hooks.extractor_command.clone())?
                .with_timeout(Duration::from_secs(config.hooks.extraction_timeout_secs)),
        ),
        None => {
            tracing::info!("No extraction result or extractor command configured, nothing to do");
            return Ok(());
        }
    };

    let store = store_for(&config);
    let engine = MergeEngine::new(config.merge_policy()?);
    let report = update_playbook(&store, extractor.as_ref(), &engine)?;

    let sink = DiagnosticSink::from_config(&config);
    if sink.is_enabled() {
        let name = if precompact { "precompact" } else { "session_end" };
        sink.record(name, &serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
