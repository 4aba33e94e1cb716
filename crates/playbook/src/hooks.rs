//! Host hook protocol
//!
//! Payload types read from the host on stdin, the response printed on
//! stdout, and the two hook flows: context injection on prompt submission
//! and playbook update at session end or before compaction.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, HooksConfig};
use crate::error::{PlaybookError, Result};
use crate::extraction::Extractor;
use crate::injection::{format_context, truncate_to_budget};
use crate::memory::merge::{MergeEngine, MergeReport};
use crate::memory::retrieval::{Ranker, SelectionRequest};
use crate::memory::tags::{infer_tags_from_text, prepare_query};
use crate::memory::types::Playbook;
use crate::storage::PlaybookStore;

/// Session-end reason sent when the user exits the prompt
pub const REASON_PROMPT_EXIT: &str = "prompt_input_exit";
/// Session-end reason sent when the session is cleared
pub const REASON_CLEAR: &str = "clear";

/// Prompt submission payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InjectInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Explicit tags, overriding those inferred from the prompt
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl InjectInput {
    /// Tags inferred from the prompt text
    pub fn prompt_tags(&self) -> Vec<String> {
        self.prompt
            .as_deref()
            .map(infer_tags_from_text)
            .unwrap_or_default()
    }

    /// Explicit tags when given, else the prompt tags
    pub fn desired_tags(&self) -> Vec<String> {
        match &self.tags {
            Some(tags) if !prepare_query(tags).is_empty() => prepare_query(tags),
            _ => self.prompt_tags(),
        }
    }
}

/// Session end / pre-compaction payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Parse a hook payload, treating blank input as an empty object
pub fn parse_input<T: for<'de> Deserialize<'de> + Default>(raw: &str) -> Result<T> {
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(raw).map_err(|e| PlaybookError::Hook(format!("Invalid hook payload: {e}")))
}

/// Response printed on stdout; serializes to `{}` when there is nothing to add
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HookOutput {
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub additional_context: String,
}

impl HookOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context for the prompt being submitted; empty context yields `{}`
    pub fn prompt_context(context: String) -> Self {
        if context.is_empty() {
            return Self::empty();
        }
        Self {
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: "UserPromptSubmit".to_string(),
                additional_context: context,
            }),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Outcome of a context injection, kept for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InjectOutcome {
    pub session_id: Option<String>,
    pub tags: Vec<String>,
    pub prompt_tags: Vec<String>,
    /// Ids of the injected key points, in order
    pub selected: Vec<String>,
    pub context: String,
}

/// Select and render context for a prompt submission.
pub fn build_context(
    input: &InjectInput,
    playbook: &Playbook,
    ranker: &Ranker,
    config: &Config,
    template: &str,
) -> InjectOutcome {
    let tags = input.desired_tags();
    let prompt_tags = input.prompt_tags();

    let request = SelectionRequest::new(tags.clone(), config.retrieval.default_limit)
        .with_prompt_tags(prompt_tags.clone())
        .with_temperature(config.retrieval.default_temperature);
    let selection = ranker.select(playbook, &request);
    let selection = truncate_to_budget(&selection, config.injection.max_tokens);
    debug!(
        "Injecting {} key points for tags {:?}",
        selection.len(),
        tags
    );

    InjectOutcome {
        session_id: input.session_id.clone(),
        selected: selection.iter().map(|r| r.key_point.id.clone()).collect(),
        context: format_context(&selection, &tags, template),
        tags,
        prompt_tags,
    }
}

/// Whether a session-end update should run.
///
/// Pre-compaction always updates. A session end whose reason is gated by a
/// disabled setting does not.
pub fn should_update(reason: Option<&str>, hooks: &HooksConfig, precompact: bool) -> bool {
    if precompact {
        return true;
    }
    match reason.unwrap_or_default() {
        REASON_PROMPT_EXIT => hooks.update_on_exit,
        REASON_CLEAR => hooks.update_on_clear,
        _ => true,
    }
}

/// Load, extract, merge and save.
pub fn update_playbook(
    store: &PlaybookStore,
    extractor: &dyn Extractor,
    engine: &MergeEngine,
) -> Result<MergeReport> {
    let mut playbook = store.load();
    let result = extractor.extract(&playbook)?;
    if result.is_empty() {
        info!("Extractor `{}` returned nothing to merge", extractor.name());
    }

    let report = engine.merge(&mut playbook, &result);
    store.save(&mut playbook)?;
    Ok(report)
}
