//! Merging extraction batches into a playbook
//!
//! A merge cycle applies evaluation deltas, folds the batch's candidates into
//! the key point list, evicts key points that fell through the score floor or
//! overflow the size cap, and finally renumbers identifiers.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::memory::scoring::{RatingScale, apply_evaluations};
use crate::memory::tags::{infer_tags_from_text, normalize_tags};
use crate::memory::types::{
    CandidateKeyPoint, DEFAULT_MAX_TAGS, EVICTION_FLOOR, ExtractionResult, KeyPoint,
    MAX_KEYPOINTS, Playbook, QualitySignals, compare_by_reputation, format_keypoint_id,
    keypoint_ordinal,
};

/// Limits and vocabulary applied by the merge engine
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    /// Maximum key points kept after a merge (default: 250)
    pub max_keypoints: usize,
    /// Key points scoring at or below this are evicted (default: -5)
    pub eviction_floor: i64,
    /// Maximum tags per key point (default: 6)
    pub max_tags: usize,
    /// Rating word to score delta mapping
    pub ratings: RatingScale,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            max_keypoints: MAX_KEYPOINTS,
            eviction_floor: EVICTION_FLOOR,
            max_tags: DEFAULT_MAX_TAGS,
            ratings: RatingScale::default(),
        }
    }
}

/// How a batch was folded into the playbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Rebuilt from a complete merged list
    Full,
    /// Merged list shorter than the playbook; new entries appended only
    Guarded,
    /// New entries appended as pending
    #[default]
    Incremental,
}

/// Outcome of one merge cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub mode: MergeMode,
    /// Evaluations that resolved to a key point
    pub evaluations_applied: usize,
    /// Key points created from candidates with no contributing source
    pub added: usize,
    /// Key points rebuilt from one or more existing sources
    pub merged: usize,
    /// Existing key points carried over untouched by a full merge
    pub preserved: usize,
    /// Key points dropped for scoring at or below the floor
    pub evicted_below_floor: usize,
    /// Key points dropped by the size cap
    pub evicted_over_cap: usize,
    /// Size of the playbook after the cycle
    pub total: usize,
}

/// Applies extraction batches to a playbook under a `MergePolicy`
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    policy: MergePolicy,
}

impl MergeEngine {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Run a full merge cycle: evaluations, candidates, eviction, renumbering.
    pub fn merge(&self, playbook: &mut Playbook, result: &ExtractionResult) -> MergeReport {
        let evaluations_applied =
            apply_evaluations(playbook, &result.evaluations, &self.policy.ratings);

        let mut report = match &result.merged_key_points {
            Some(merged) if !merged.is_empty() && merged.len() < playbook.len() => {
                warn!(
                    "Merged list is shorter than the playbook ({} < {}), treating entries as additions",
                    merged.len(),
                    playbook.len()
                );
                self.merge_guarded(playbook, merged)
            }
            Some(merged) => self.merge_full(playbook, merged),
            None => self.merge_incremental(playbook, &result.new_key_points),
        };
        report.evaluations_applied = evaluations_applied;

        let (below_floor, over_cap) = self.evict(playbook);
        report.evicted_below_floor = below_floor;
        report.evicted_over_cap = over_cap;

        playbook.renumber();
        report.total = playbook.len();

        info!(
            "Merge ({:?}): {} evaluations, {} added, {} merged, {} preserved, {} evicted, {} total",
            report.mode,
            report.evaluations_applied,
            report.added,
            report.merged,
            report.preserved,
            report.evicted_below_floor + report.evicted_over_cap,
            report.total
        );
        report
    }

    /// Drop key points at or below the score floor, then trim to the size
    /// cap keeping the best by (score desc, id asc).
    ///
    /// Returns (evicted below floor, evicted over cap).
    pub fn evict(&self, playbook: &mut Playbook) -> (usize, usize) {
        let before = playbook.len();
        let floor = self.policy.eviction_floor;
        playbook.key_points.retain(|kp| kp.score > floor);
        let below_floor = before - playbook.len();

        let mut over_cap = 0;
        if playbook.len() > self.policy.max_keypoints {
            over_cap = playbook.len() - self.policy.max_keypoints;
            playbook.key_points.sort_by(compare_by_reputation);
            playbook.key_points.truncate(self.policy.max_keypoints);
        }

        (below_floor, over_cap)
    }

    fn merge_full(&self, playbook: &mut Playbook, merged: &[CandidateKeyPoint]) -> MergeReport {
        let mut report = MergeReport {
            mode: MergeMode::Full,
            ..MergeReport::default()
        };
        let existing = std::mem::take(&mut playbook.key_points);
        let mut next_ordinal = highest_ordinal(&existing) + 1;

        let mut by_id: HashMap<&str, usize> = HashMap::new();
        let mut by_text: HashMap<&str, usize> = HashMap::new();
        for (idx, kp) in existing.iter().enumerate() {
            by_id.entry(kp.id.as_str()).or_insert(idx);
            by_text.entry(kp.text.as_str()).or_insert(idx);
        }

        let mut consumed = vec![false; existing.len()];
        let mut seen_texts: HashSet<String> = HashSet::new();
        let mut rebuilt: Vec<KeyPoint> = Vec::with_capacity(merged.len() + existing.len());

        for candidate in merged {
            if !seen_texts.insert(candidate.text.clone()) {
                continue;
            }

            let mut contributors: Vec<usize> = Vec::new();
            for source in &candidate.sources {
                match by_id.get(source.as_str()) {
                    Some(&idx) if !consumed[idx] && !contributors.contains(&idx) => {
                        contributors.push(idx)
                    }
                    _ => {}
                }
            }
            if contributors.is_empty() {
                match by_text.get(candidate.text.as_str()) {
                    Some(&idx) if !consumed[idx] => contributors.push(idx),
                    _ => {}
                }
            }
            for &idx in &contributors {
                consumed[idx] = true;
            }

            let sources: Vec<&KeyPoint> = contributors.iter().map(|&idx| &existing[idx]).collect();
            let id = match sources.first() {
                Some(first) => first.id.clone(),
                None => {
                    let id = format_keypoint_id(next_ordinal);
                    next_ordinal += 1;
                    id
                }
            };
            if sources.is_empty() {
                report.added += 1;
            } else {
                report.merged += 1;
            }
            rebuilt.push(self.build_keypoint(id, candidate, &sources));
        }

        for (idx, kp) in existing.into_iter().enumerate() {
            if consumed[idx] || seen_texts.contains(&kp.text) {
                continue;
            }
            seen_texts.insert(kp.text.clone());
            rebuilt.push(kp);
            report.preserved += 1;
        }

        playbook.key_points = rebuilt;
        report
    }

    fn merge_guarded(&self, playbook: &mut Playbook, merged: &[CandidateKeyPoint]) -> MergeReport {
        let mut report = MergeReport {
            mode: MergeMode::Guarded,
            ..MergeReport::default()
        };

        for candidate in merged {
            if playbook.contains_text(&candidate.text) {
                continue;
            }
            let mut sources: Vec<&KeyPoint> = Vec::new();
            for source in &candidate.sources {
                if let Some(kp) = playbook.get(source) {
                    if !sources.iter().any(|s| s.id == kp.id) {
                        sources.push(kp);
                    }
                }
            }
            let keypoint = self.build_keypoint(playbook.next_id(), candidate, &sources);
            playbook.key_points.push(keypoint);
            report.added += 1;
        }

        report
    }

    fn merge_incremental(
        &self,
        playbook: &mut Playbook,
        new_key_points: &[CandidateKeyPoint],
    ) -> MergeReport {
        let mut report = MergeReport {
            mode: MergeMode::Incremental,
            ..MergeReport::default()
        };

        for candidate in new_key_points {
            if playbook.contains_text(&candidate.text) {
                continue;
            }
            let keypoint = KeyPoint {
                id: playbook.next_id(),
                text: candidate.text.clone(),
                score: 0,
                tags: self.resolve_tags(candidate, &[]),
                pending: true,
                signals: candidate.signals_over(QualitySignals::default()),
            };
            playbook.key_points.push(keypoint);
            report.added += 1;
        }

        report
    }

    /// Confirmed key point for a candidate, inheriting score, tags and signals
    /// from its contributing sources.
    fn build_keypoint(&self, id: String, candidate: &CandidateKeyPoint, sources: &[&KeyPoint]) -> KeyPoint {
        let base_signals = sources.first().map(|kp| kp.signals).unwrap_or_default();
        KeyPoint {
            id,
            text: candidate.text.clone(),
            score: sources.iter().map(|kp| kp.score).sum(),
            tags: self.resolve_tags(candidate, sources),
            pending: false,
            signals: candidate.signals_over(base_signals),
        }
    }

    /// Explicit tags, else the union of the sources' tags, else tags inferred
    /// from the text.
    fn resolve_tags(&self, candidate: &CandidateKeyPoint, sources: &[&KeyPoint]) -> Vec<String> {
        let explicit = normalize_tags(&candidate.tags, self.policy.max_tags);
        if !explicit.is_empty() {
            return explicit;
        }
        let inherited: Vec<&str> = sources
            .iter()
            .flat_map(|kp| kp.tags.iter().map(String::as_str))
            .collect();
        let inherited = normalize_tags(&inherited, self.policy.max_tags);
        if !inherited.is_empty() {
            return inherited;
        }
        normalize_tags(&infer_tags_from_text(&candidate.text), self.policy.max_tags)
    }
}

fn highest_ordinal(key_points: &[KeyPoint]) -> usize {
    key_points
        .iter()
        .filter_map(|kp| keypoint_ordinal(&kp.id))
        .max()
        .unwrap_or(0) as usize
}
