use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{PlaybookError, Result};
use crate::memory::merge::MergePolicy;
use crate::memory::retrieval::{ContextRule, ContextRules, RankerConfig};
use crate::memory::scoring::{RatingScale, RatingScheme};
use crate::memory::types::{DEFAULT_MAX_TAGS, EVICTION_FLOOR, MAX_KEYPOINTS};

/// Environment variable naming the host project directory
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

/// Main configuration structure for Playbook
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the playbook document lives
    #[serde(default)]
    pub storage: StorageConfig,
    /// Size and eviction limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Rating vocabulary
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Selection defaults and ranking policy
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Context block rendering
    #[serde(default)]
    pub injection: InjectionConfig,
    /// Hook protocol behaviour
    #[serde(default)]
    pub hooks: HooksConfig,
    /// Diagnostic dumps
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Project directory: configured, else `$CLAUDE_PROJECT_DIR`, else the
    /// current directory
    pub fn project_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.project_dir {
            return dir.clone();
        }
        std::env::var_os(PROJECT_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Location of the playbook document
    pub fn playbook_path(&self) -> PathBuf {
        match &self.storage.playbook_file {
            Some(path) => path.clone(),
            None => self.project_dir().join(".claude").join("playbook.json"),
        }
    }

    /// Location of diagnostic dumps
    pub fn diagnostics_dir(&self) -> PathBuf {
        match &self.diagnostics.dir {
            Some(dir) => dir.clone(),
            None => self.project_dir().join(".claude").join("diagnostic"),
        }
    }

    /// Rating scale for the configured scheme with overrides applied
    pub fn rating_scale(&self) -> Result<RatingScale> {
        RatingScale::for_scheme(self.scoring.scheme).with_overrides(&self.scoring.ratings)
    }

    pub fn merge_policy(&self) -> Result<MergePolicy> {
        Ok(MergePolicy {
            max_keypoints: self.limits.max_keypoints,
            eviction_floor: self.limits.eviction_floor,
            max_tags: self.limits.max_tags,
            ratings: self.rating_scale()?,
        })
    }

    pub fn ranker_config(&self) -> RankerConfig {
        let retrieval = &self.retrieval;
        RankerConfig {
            high_confidence_threshold: retrieval.high_confidence_threshold,
            conservative_max: retrieval.conservative_max,
            exploratory_min: retrieval.exploratory_min,
            context_rules: match &retrieval.context_rules {
                Some(rules) => ContextRules::new(rules.clone()),
                None => ContextRules::default(),
            },
        }
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        self.rating_scale()?;
        if self.limits.max_keypoints == 0 {
            return Err(PlaybookError::Config(
                "limits.max_keypoints must be at least 1".to_string(),
            ));
        }
        let retrieval = &self.retrieval;
        if !(0.0..=1.0).contains(&retrieval.default_temperature) {
            return Err(PlaybookError::Config(format!(
                "retrieval.default_temperature {} is outside [0, 1]",
                retrieval.default_temperature
            )));
        }
        if retrieval.conservative_max >= retrieval.exploratory_min {
            return Err(PlaybookError::Config(format!(
                "retrieval.conservative_max ({}) must be below retrieval.exploratory_min ({})",
                retrieval.conservative_max, retrieval.exploratory_min
            )));
        }
        Ok(())
    }
}

/// Load configuration from an explicit path, else the first default location
/// that exists, else built-in defaults.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = match config_path {
        Some(path) => read_config(path)?,
        None => {
            let default_paths = [
                dirs::home_dir().map(|h| h.join(".playbook").join("config.toml")),
                dirs::config_dir().map(|c| c.join("playbook").join("config.toml")),
                Some(PathBuf::from("playbook.toml")),
            ];

            match default_paths.iter().flatten().find(|path| path.exists()) {
                Some(path) => read_config(path)?,
                None => {
                    tracing::debug!("No config file found, using defaults");
                    Config::default()
                }
            }
        }
    };

    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config> {
    tracing::debug!("Loading config from: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
        PlaybookError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| PlaybookError::Config(format!("Failed to parse config: {e}")))
}

/// Playbook location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Host project directory (default: `$CLAUDE_PROJECT_DIR`, else cwd)
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    /// Playbook document (default: `<project_dir>/.claude/playbook.json`)
    #[serde(default)]
    pub playbook_file: Option<PathBuf>,
}

/// Size and eviction limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum key points kept
    #[serde(default = "default_max_keypoints")]
    pub max_keypoints: usize,
    /// Maximum tags per key point
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    /// Key points scoring at or below this are evicted
    #[serde(default = "default_eviction_floor")]
    pub eviction_floor: i64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_keypoints: default_max_keypoints(),
            max_tags: default_max_tags(),
            eviction_floor: default_eviction_floor(),
        }
    }
}

fn default_max_keypoints() -> usize {
    MAX_KEYPOINTS
}

fn default_max_tags() -> usize {
    DEFAULT_MAX_TAGS
}

fn default_eviction_floor() -> i64 {
    EVICTION_FLOOR
}

/// Rating vocabulary configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Built-in vocabulary
    #[serde(default)]
    pub scheme: RatingScheme,
    /// Per-rating delta overrides and additions
    #[serde(default)]
    pub ratings: BTreeMap<String, i64>,
}

/// Selection defaults and ranking policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Key points selected per request
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Temperature used when a request gives none
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    /// Minimum score for the high-confidence layer
    #[serde(default = "default_high_confidence_threshold")]
    pub high_confidence_threshold: i64,
    /// Upper bound of the conservative temperature range
    #[serde(default = "default_conservative_max")]
    pub conservative_max: f64,
    /// Lower bound of the exploratory temperature range
    #[serde(default = "default_exploratory_min")]
    pub exploratory_min: f64,
    /// Ordered rule table replacing the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_rules: Option<Vec<ContextRule>>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_temperature: default_temperature(),
            high_confidence_threshold: default_high_confidence_threshold(),
            conservative_max: default_conservative_max(),
            exploratory_min: default_exploratory_min(),
            context_rules: None,
        }
    }
}

fn default_limit() -> usize {
    6
}

fn default_temperature() -> f64 {
    0.5
}

fn default_high_confidence_threshold() -> i64 {
    2
}

fn default_conservative_max() -> f64 {
    0.3
}

fn default_exploratory_min() -> f64 {
    0.7
}

/// Context block rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Token budget for the rendered block
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Template file with `{key_points}` and `{tags}` placeholders
    #[serde(default)]
    pub template: Option<PathBuf>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            template: None,
        }
    }
}

fn default_max_tokens() -> usize {
    2000
}

/// Hook protocol behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Update the playbook when a session ends by prompt exit
    #[serde(default)]
    pub update_on_exit: bool,
    /// Update the playbook when a session is cleared
    #[serde(default)]
    pub update_on_clear: bool,
    /// Command (argv) producing an extraction result on stdout
    #[serde(default)]
    pub extractor_command: Vec<String>,
    /// Seconds before the extractor command is killed
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            update_on_exit: false,
            update_on_clear: false,
            extractor_command: Vec::new(),
            extraction_timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

fn default_extraction_timeout_secs() -> u64 {
    120
}

/// Diagnostic dump configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Write diagnostic dumps
    #[serde(default)]
    pub enabled: bool,
    /// Dump directory (default: `<project_dir>/.claude/diagnostic`)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}
