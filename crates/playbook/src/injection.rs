//! Context Injection for Selected Key Points
//!
//! Renders a ranked selection into the text block handed back to the host as
//! additional prompt context.

use std::path::Path;

use tracing::warn;

use crate::memory::retrieval::RankedKeyPoint;

/// Template used when no readable template file is configured
pub const DEFAULT_TEMPLATE: &str = "\
# Playbook
Knowledge collected from earlier sessions, relevant to: {tags}.
Higher scores have proven useful more often.

{key_points}
";

/// Chars/4 token approximation
#[inline]
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Render one key point as `- [score=N][tags=a,b] text`
pub fn format_line(ranked: &RankedKeyPoint<'_>) -> String {
    let kp = ranked.key_point;
    format!("- [score={}][tags={}] {}", kp.score, kp.tags.join(","), kp.text)
}

/// Render a selection into `template`.
///
/// An empty selection renders as the empty string.
pub fn format_context(selection: &[RankedKeyPoint<'_>], tags: &[String], template: &str) -> String {
    if selection.is_empty() {
        return String::new();
    }

    let tags_text = if tags.is_empty() {
        "all topics".to_string()
    } else {
        tags.join(", ")
    };
    let key_points_text = selection
        .iter()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n");

    template
        .replace("{tags}", &tags_text)
        .replace("{key_points}", &key_points_text)
}

/// Keep the leading entries of a ranked selection that fit `max_tokens`.
pub fn truncate_to_budget<'a>(
    selection: &[RankedKeyPoint<'a>],
    max_tokens: usize,
) -> Vec<RankedKeyPoint<'a>> {
    if selection.is_empty() || max_tokens == 0 {
        return Vec::new();
    }

    // Header and footer of the default template
    const TEMPLATE_OVERHEAD_TOKENS: usize = 30;
    // "- [score=N][tags=...] " prefix, tags counted separately
    const PER_LINE_OVERHEAD_TOKENS: usize = 5;

    let available_tokens = max_tokens.saturating_sub(TEMPLATE_OVERHEAD_TOKENS);
    let mut used_tokens = 0;
    let mut result = Vec::new();

    for ranked in selection {
        let kp = ranked.key_point;
        let line_tokens = estimate_tokens(&kp.text)
            + estimate_tokens(&kp.tags.join(","))
            + PER_LINE_OVERHEAD_TOKENS;

        if used_tokens + line_tokens > available_tokens {
            break;
        }
        result.push(ranked.clone());
        used_tokens += line_tokens;
    }

    result
}

/// Read a template file, falling back to the built-in one.
pub fn load_template(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_TEMPLATE.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(template) => template,
        Err(e) => {
            warn!(
                "Failed to read template {}, using built-in: {e}",
                path.display()
            );
            DEFAULT_TEMPLATE.to_string()
        }
    }
}
