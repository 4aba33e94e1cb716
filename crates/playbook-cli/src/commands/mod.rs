pub mod config;
pub mod list;
pub mod merge;
pub mod select;
pub mod show;
pub mod stats;

pub use config::ConfigCommand;
pub use list::ListCommand;
pub use merge::MergeCommand;
pub use select::SelectCommand;
pub use show::ShowCommand;
pub use stats::StatsCommand;

use std::path::{Path, PathBuf};

use playbook::config::{Config, load_config};
use playbook::storage::PlaybookStore;

use crate::error::CliResult;

/// Effective configuration and the store it points at
pub struct Workspace {
    pub config: Config,
    pub store: PlaybookStore,
}

impl Workspace {
    /// Load configuration; `playbook_path` overrides the configured document
    pub fn open(config_path: Option<&Path>, playbook_path: Option<PathBuf>) -> CliResult<Self> {
        let mut config = load_config(config_path)?;
        if let Some(path) = playbook_path {
            config.storage.playbook_file = Some(path);
        }
        let store = PlaybookStore::new(config.playbook_path())
            .with_max_tags(config.limits.max_tags)
            .with_eviction_floor(config.limits.eviction_floor);
        tracing::debug!("Using playbook at {}", store.path().display());
        Ok(Self { config, store })
    }
}
