//! Inference of quality signals for key points that were stored without them
//!
//! Older playbooks carry only text, score and tags. These keyword heuristics
//! give such entries plausible effect, risk and innovation estimates so the
//! ranker can treat them like any other key point.

use crate::memory::types::QualitySignals;

const HIGH_RISK_KEYWORDS: &[&str] = &[
    "experimental",
    "cutting-edge",
    "unstable",
    "beta",
    "risky",
    "dangerous",
    "hack",
];
const MEDIUM_RISK_KEYWORDS: &[&str] = &["new", "alternative", "innovative", "advanced"];
const SAFE_KEYWORDS: &[&str] = &["standard", "proven", "stable", "tested", "safe", "reliable"];

const HIGH_INNOVATION_KEYWORDS: &[&str] = &[
    "breakthrough",
    "revolutionary",
    "novel",
    "first-time",
    "pioneering",
    "quantum",
    "ai-driven",
    "machine-learning",
];
const MEDIUM_INNOVATION_KEYWORDS: &[&str] = &[
    "clever",
    "smart",
    "intelligent",
    "advanced",
    "optimized",
    "improved",
    "creative",
];
const STANDARD_KEYWORDS: &[&str] = &[
    "standard",
    "basic",
    "simple",
    "regular",
    "common",
    "traditional",
    "conventional",
];

const INNOVATION_TAGS: &[&str] = &[
    "ai",
    "ml",
    "quantum",
    "blockchain",
    "ar",
    "vr",
    "experimental",
    "research",
];
const ADVANCED_TAGS: &[&str] = &["advanced", "modern", "next-gen", "cutting-edge", "optimization"];
const BASIC_TAGS: &[&str] = &["basic", "standard", "simple", "common"];

fn mentions_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| haystack.contains(keyword))
}

/// Effectiveness implied by an accumulated score
pub fn effect_from_score(score: i64) -> f64 {
    match score {
        s if s >= 3 => 0.9,
        s if s >= 1 => 0.6,
        s if s >= 0 => 0.4,
        _ => 0.2,
    }
}

/// Risk implied by the wording of a key point
pub fn risk_from_text(text: &str) -> f64 {
    let lower = text.to_lowercase();
    if mentions_any(&lower, HIGH_RISK_KEYWORDS) {
        0.2
    } else if mentions_any(&lower, MEDIUM_RISK_KEYWORDS) {
        -0.2
    } else if mentions_any(&lower, SAFE_KEYWORDS) {
        -0.8
    } else {
        -0.4
    }
}

/// Risk implied by wording, shifted by track record: proven items read as
/// safer, unproven ones as riskier.
pub fn risk_from_text_and_score(text: &str, score: i64) -> f64 {
    let base = risk_from_text(text);
    let shifted = match score {
        s if s >= 2 => base - 0.3,
        s if s >= 1 => base,
        _ => base + 0.2,
    };
    shifted.clamp(-1.0, 1.0)
}

/// Novelty implied by the wording of a key point
pub fn innovation_from_text(text: &str) -> f64 {
    let lower = text.to_lowercase();
    if mentions_any(&lower, HIGH_INNOVATION_KEYWORDS) {
        0.9
    } else if mentions_any(&lower, MEDIUM_INNOVATION_KEYWORDS) {
        0.6
    } else if mentions_any(&lower, STANDARD_KEYWORDS) {
        0.2
    } else {
        0.5
    }
}

/// Novelty implied by a key point's tags
pub fn innovation_from_tags<S: AsRef<str>>(tags: &[S]) -> f64 {
    if tags.is_empty() {
        return 0.5;
    }
    let joined = tags
        .iter()
        .map(|t| t.as_ref().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    if mentions_any(&joined, INNOVATION_TAGS) {
        0.8
    } else if mentions_any(&joined, ADVANCED_TAGS) {
        0.6
    } else if mentions_any(&joined, BASIC_TAGS) {
        0.3
    } else {
        0.5
    }
}

/// Signals for a legacy entry that was stored as a bare string
pub fn infer_for_text(text: &str) -> QualitySignals {
    QualitySignals::new(effect_from_score(0), risk_from_text(text), innovation_from_text(text))
}

/// Fill whichever signals are missing from a stored key point
pub fn fill_missing<S: AsRef<str>>(
    text: &str,
    score: i64,
    tags: &[S],
    effect_rating: Option<f64>,
    risk_level: Option<f64>,
    innovation_level: Option<f64>,
) -> QualitySignals {
    QualitySignals::new(
        effect_rating.unwrap_or_else(|| effect_from_score(score)),
        risk_level.unwrap_or_else(|| risk_from_text_and_score(text, score)),
        innovation_level.unwrap_or_else(|| innovation_from_tags(tags)),
    )
}
