//! Tag normalization and fuzzy tag matching
//!
//! Tags are lowercase ASCII strings. Matching between a key point's tags and
//! the tags a caller asks for is graded: exact, substring, shared token.

use std::collections::HashSet;

use crate::memory::types::MAX_TAG_LEN;

/// Score for an exact tag match
pub const EXACT_MATCH: u8 = 3;
/// Score when one tag contains the other
pub const SUBSTRING_MATCH: u8 = 2;
/// Score when the tags share an alphanumeric token
pub const TOKEN_MATCH: u8 = 1;

/// Maximum number of tags inferred from free text
pub const MAX_INFERRED_TAGS: usize = 5;

const STOPWORDS: &[&str] = &[
    "the", "this", "that", "with", "from", "into", "your", "their", "have", "having", "using",
    "use", "used", "for", "and", "when", "while", "after", "before", "code", "error", "issue",
    "fix", "task",
];

/// Normalize a tag list: lowercase, trim, drop non-ASCII and empty tags,
/// de-duplicate keeping first occurrence, truncate to 64 characters and cap
/// the count at `max_tags`.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S], max_tags: usize) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();

    for tag in tags {
        if normalized.len() >= max_tags {
            break;
        }
        let clean = tag.as_ref().trim().to_lowercase();
        if clean.is_empty() || !clean.is_ascii() {
            continue;
        }
        // ASCII, so byte truncation is a character truncation
        let clean = clean[..clean.len().min(MAX_TAG_LEN)].to_string();
        if normalized.contains(&clean) {
            continue;
        }
        normalized.push(clean);
    }

    normalized
}

/// Grade how well a key point tag matches a requested tag.
///
/// Both arguments are expected in lowercase.
pub fn match_score(candidate: &str, desired: &str) -> u8 {
    if candidate == desired {
        return EXACT_MATCH;
    }
    if candidate.contains(desired) || desired.contains(candidate) {
        return SUBSTRING_MATCH;
    }
    let candidate_tokens: HashSet<&str> = tokens(candidate).collect();
    if tokens(desired).any(|token| candidate_tokens.contains(token)) {
        TOKEN_MATCH
    } else {
        0
    }
}

fn tokens(tag: &str) -> impl Iterator<Item = &str> {
    tag.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
}

/// Result of matching one key point's tags against a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagMatch {
    /// Best `match_score` over all (candidate, desired) pairs
    pub best: u8,
    /// Number of distinct desired tags matched by at least one candidate tag
    pub coverage: usize,
    /// How many of the covered desired tags are also prompt-seed tags
    pub prompt_hits: usize,
}

/// Match a key point's tags against the desired tags.
///
/// `desired_tags` must be lowercase and free of duplicates.
pub fn score_and_coverage<S: AsRef<str>>(
    candidate_tags: &[S],
    desired_tags: &[String],
    prompt_seed_tags: &HashSet<String>,
) -> TagMatch {
    let mut best = 0;
    let mut covered: HashSet<&str> = HashSet::new();

    'outer: for candidate in candidate_tags {
        let candidate = candidate.as_ref().to_lowercase();
        for desired in desired_tags {
            let score = match_score(&candidate, desired);
            if score == 0 {
                continue;
            }
            covered.insert(desired.as_str());
            best = best.max(score);
            if best == EXACT_MATCH && covered.len() == desired_tags.len() {
                break 'outer;
            }
        }
    }

    TagMatch {
        best,
        coverage: covered.len(),
        prompt_hits: covered
            .iter()
            .filter(|tag| prompt_seed_tags.contains(**tag))
            .count(),
    }
}

/// Heuristic tags for text that carries none: distinct lowercase words of at
/// least three characters, skipping stop words, in order of appearance.
pub fn infer_tags_from_text(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tags: Vec<String> = Vec::new();

    for word in lower.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-')) {
        if tags.len() >= MAX_INFERRED_TAGS {
            break;
        }
        // A word must start with a letter; strip any leading digits, '_' or '-'
        let word = word.trim_start_matches(|c: char| !c.is_ascii_alphabetic());
        if word.len() < 3 || STOPWORDS.contains(&word) {
            continue;
        }
        if !tags.iter().any(|t| t == word) {
            tags.push(word.to_string());
        }
    }

    tags
}

/// Lowercase, trim and de-duplicate a caller's tag request.
pub fn prepare_query<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut prepared: Vec<String> = Vec::new();
    for tag in tags {
        let clean = tag.as_ref().trim().to_lowercase();
        if !clean.is_empty() && !prepared.contains(&clean) {
            prepared.push(clean);
        }
    }
    prepared
}
