//! Rating vocabulary and evaluation deltas
//!
//! The extraction collaborator rates existing key points with words such as
//! `moderately_useful`. A `RatingScale` maps those words to score deltas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlaybookError, Result};
use crate::memory::types::{Evaluation, Playbook};

/// The rating word that must never lower a score
pub const NEUTRAL_RATING: &str = "neutral";

/// Built-in rating vocabularies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingScheme {
    /// Seven levels from `highly_effective` to `highly_dangerous`
    #[default]
    Graded,
    /// `helpful`, `neutral`, `harmful`
    ThreeBucket,
}

/// Mapping from rating word to score delta.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingScale {
    deltas: BTreeMap<String, i64>,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self::graded()
    }
}

impl RatingScale {
    /// Seven-level vocabulary
    pub fn graded() -> Self {
        Self::from_pairs(&[
            ("highly_effective", 3),
            ("moderately_useful", 2),
            ("slightly_useful", 1),
            (NEUTRAL_RATING, 0),
            ("slightly_harmful", -1),
            ("moderately_harmful", -2),
            ("highly_dangerous", -4),
        ])
    }

    /// Three-bucket vocabulary
    pub fn three_bucket() -> Self {
        Self::from_pairs(&[("helpful", 1), (NEUTRAL_RATING, 0), ("harmful", -3)])
    }

    pub fn for_scheme(scheme: RatingScheme) -> Self {
        match scheme {
            RatingScheme::Graded => Self::graded(),
            RatingScheme::ThreeBucket => Self::three_bucket(),
        }
    }

    fn from_pairs(pairs: &[(&str, i64)]) -> Self {
        Self {
            deltas: pairs
                .iter()
                .map(|(rating, delta)| (rating.to_string(), *delta))
                .collect(),
        }
    }

    /// Add or replace individual rating deltas.
    ///
    /// Fails if the result would make `neutral` subtract from a score, which
    /// would decay untouched key points toward eviction cycle after cycle.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, i64>) -> Result<Self> {
        for (rating, delta) in overrides {
            self.deltas.insert(rating.trim().to_lowercase(), *delta);
        }
        if self.delta(NEUTRAL_RATING) < 0 {
            return Err(PlaybookError::Config(format!(
                "rating '{NEUTRAL_RATING}' must not subtract score (got {})",
                self.delta(NEUTRAL_RATING)
            )));
        }
        Ok(self)
    }

    /// Delta for a rating word; unknown words change nothing.
    pub fn delta(&self, rating: &str) -> i64 {
        let key = rating.trim().to_lowercase();
        match self.deltas.get(&key) {
            Some(delta) => *delta,
            None => {
                debug!("Unknown rating '{rating}', applying no change");
                0
            }
        }
    }

    pub fn ratings(&self) -> impl Iterator<Item = (&str, i64)> {
        self.deltas.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Apply evaluation deltas to the key points they name.
///
/// Evaluations for ids that do not resolve to a live key point are ignored.
/// Returns the number of evaluations applied.
pub fn apply_evaluations(
    playbook: &mut Playbook,
    evaluations: &[Evaluation],
    scale: &RatingScale,
) -> usize {
    let mut applied = 0;
    for evaluation in evaluations {
        let Some(kp) = playbook.get_mut(&evaluation.id) else {
            debug!("Evaluation for unknown key point {}", evaluation.id);
            continue;
        };
        kp.score += scale.delta(&evaluation.rating);
        applied += 1;
    }
    applied
}
