//! Key Point Retrieval with Temperature-Weighted Dual-Layer Ranking
//!
//! Selection runs in three stages:
//! 1. Tag matching drops key points with no overlap against the requested tags
//! 2. Each survivor is weighted by match quality, its own score, a
//!    temperature multiplier for its layer and a contextual adjustment
//! 3. The result limit is split between the high-confidence and
//!    recommendation layers according to temperature
//!
//! Ranking data lives in `Ranking`, next to a borrowed `KeyPoint`. It is
//! produced fresh per call and never written back to the playbook.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::tags::{prepare_query, score_and_coverage};
use crate::memory::types::{KeyPoint, Playbook, compare_by_reputation};

/// Temperature used when a caller supplies none or an invalid value
pub const DEFAULT_TEMPERATURE: f64 = 0.5;

/// Which ranking layer a key point belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Proven key points (score at or above the confidence threshold)
    HighConfidence,
    /// Newer or less proven key points
    Recommendation,
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::HighConfidence => write!(f, "high_confidence"),
            Layer::Recommendation => write!(f, "recommendation"),
        }
    }
}

/// Per-call ranking metadata for one selected key point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ranking {
    pub layer: Layer,
    /// Best tag match grade (0-3)
    pub match_score: u8,
    /// Distinct requested tags matched
    pub coverage: usize,
    /// Covered tags that were also inferred from the prompt
    pub prompt_hits: usize,
    /// Weight before the temperature multiplier
    pub base_weight: f64,
    /// Temperature multiplier after contextual adjustment
    pub multiplier: f64,
    /// Final weight used for ordering
    pub weight: f64,
    /// 1-based position within its layer
    pub layer_rank: usize,
}

/// A selected key point with its ranking metadata
#[derive(Debug, Clone, Serialize)]
pub struct RankedKeyPoint<'a> {
    pub key_point: &'a KeyPoint,
    pub ranking: Ranking,
}

/// Parameters for one selection call
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    /// Tags to match; empty selects by reputation alone
    pub tags: Vec<String>,
    /// Maximum results
    pub limit: usize,
    /// Tags inferred from the user's prompt, rewarded when covered
    pub prompt_tags: Vec<String>,
    /// 0.0 favours proven knowledge, 1.0 favours exploration
    pub temperature: f64,
}

impl SelectionRequest {
    pub fn new<S: Into<String>>(tags: impl IntoIterator<Item = S>, limit: usize) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            limit,
            prompt_tags: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_prompt_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.prompt_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Contextual weights applied to one layer's multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextWeights {
    /// Multiplied by `effect_rating` (high-confidence layer)
    pub effect_weight: f64,
    /// Multiplied by `innovation_level` (recommendation layer)
    pub innovation_weight: f64,
    /// Risk boundary for the safety bonus / risk discount
    pub risk_threshold: f64,
}

impl ContextWeights {
    pub const fn new(effect_weight: f64, innovation_weight: f64, risk_threshold: f64) -> Self {
        Self {
            effect_weight,
            innovation_weight,
            risk_threshold,
        }
    }
}

impl Default for ContextWeights {
    fn default() -> Self {
        Self::new(0.3, 0.4, -0.2)
    }
}

/// A keyword-triggered weight tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRule {
    pub name: String,
    /// Substrings looked for in the joined request tags
    pub keywords: Vec<String>,
    pub high_confidence: ContextWeights,
    pub recommendation: ContextWeights,
}

impl ContextRule {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        keywords: impl IntoIterator<Item = S>,
        high_confidence: ContextWeights,
        recommendation: ContextWeights,
    ) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            high_confidence,
            recommendation,
        }
    }

    fn matches(&self, context: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && context.contains(&keyword.to_lowercase()))
    }

    fn weights(&self, layer: Layer) -> ContextWeights {
        match layer {
            Layer::HighConfidence => self.high_confidence,
            Layer::Recommendation => self.recommendation,
        }
    }
}

/// Ordered rule table; the first matching rule wins
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRules {
    rules: Vec<ContextRule>,
    fallback: ContextWeights,
}

impl Default for ContextRules {
    fn default() -> Self {
        Self::new(vec![
            ContextRule::new(
                "urgent",
                ["fix", "bug", "error", "urgent", "critical", "broken"],
                ContextWeights::new(0.5, 0.1, -0.3),
                ContextWeights::new(0.2, 0.2, -0.6),
            ),
            ContextRule::new(
                "production",
                ["production", "deploy", "release", "customer", "enterprise", "stable"],
                ContextWeights::new(0.4, 0.2, -0.4),
                ContextWeights::new(0.3, 0.3, -0.3),
            ),
            ContextRule::new(
                "exploratory",
                [
                    "explore",
                    "learn",
                    "research",
                    "alternative",
                    "innovative",
                    "prototype",
                    "experimental",
                ],
                ContextWeights::new(0.2, 0.4, -0.1),
                ContextWeights::new(0.1, 0.6, 0.2),
            ),
        ])
    }
}

impl ContextRules {
    pub fn new(rules: Vec<ContextRule>) -> Self {
        Self {
            rules,
            fallback: ContextWeights::default(),
        }
    }

    pub fn rules(&self) -> &[ContextRule] {
        &self.rules
    }

    /// Weights for a layer given the joined, lowercase request tags
    pub fn weights_for(&self, context: &str, layer: Layer) -> ContextWeights {
        self.rules
            .iter()
            .find(|rule| rule.matches(context))
            .map_or(self.fallback, |rule| rule.weights(layer))
    }
}

/// Tunable parameters of the ranker
#[derive(Debug, Clone, PartialEq)]
pub struct RankerConfig {
    /// Minimum own score for the high-confidence layer (default: 2)
    pub high_confidence_threshold: i64,
    /// Temperatures at or below this are conservative (default: 0.3)
    pub conservative_max: f64,
    /// Temperatures at or above this are exploratory (default: 0.7)
    pub exploratory_min: f64,
    /// Contextual adjustment rules
    pub context_rules: ContextRules,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: 2,
            conservative_max: 0.3,
            exploratory_min: 0.7,
            context_rules: ContextRules::default(),
        }
    }
}

/// Temperature regime derived from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    Conservative,
    Balanced,
    Exploratory,
}

/// Selects relevance-ranked key points from a playbook snapshot
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    config: RankerConfig,
}

impl Ranker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Rank and select key points for a request.
    ///
    /// Never fails: an empty playbook, a zero limit, or tags nothing matches
    /// all yield an empty selection.
    pub fn select<'a>(
        &self,
        playbook: &'a Playbook,
        request: &SelectionRequest,
    ) -> Vec<RankedKeyPoint<'a>> {
        if request.limit == 0 {
            return Vec::new();
        }

        let desired = prepare_query(&request.tags);
        if desired.is_empty() {
            return self.select_by_reputation(playbook, request.limit);
        }

        let temperature = sanitize_temperature(request.temperature);
        let regime = self.regime(temperature);
        let prompt_seeds: HashSet<String> = prepare_query(&request.prompt_tags).into_iter().collect();
        let context = desired.join(" ");

        let mut high_confidence: Vec<RankedKeyPoint<'a>> = Vec::new();
        let mut recommendation: Vec<RankedKeyPoint<'a>> = Vec::new();

        for kp in playbook.key_points.iter().filter(|kp| kp.score >= 0) {
            let tag_match = score_and_coverage(&kp.tags, &desired, &prompt_seeds);
            if tag_match.coverage == 0 {
                continue;
            }

            let layer = self.layer_for(kp);
            let base_weight = (10 * tag_match.coverage) as f64
                + (3 * tag_match.best as usize) as f64
                + (5 * tag_match.prompt_hits) as f64
                + kp.score as f64;
            let weights = self.config.context_rules.weights_for(&context, layer);
            let multiplier = self.multiplier(kp, layer, temperature, weights);

            let ranked = RankedKeyPoint {
                key_point: kp,
                ranking: Ranking {
                    layer,
                    match_score: tag_match.best,
                    coverage: tag_match.coverage,
                    prompt_hits: tag_match.prompt_hits,
                    base_weight,
                    multiplier,
                    weight: base_weight * multiplier,
                    layer_rank: 0,
                },
            };
            match layer {
                Layer::HighConfidence => high_confidence.push(ranked),
                Layer::Recommendation => recommendation.push(ranked),
            }
        }

        let (hc_quota, rc_quota) = self.allocate(request.limit, regime);
        let high_confidence = top_of_layer(high_confidence, hc_quota);
        let recommendation = top_of_layer(recommendation, rc_quota);

        debug!(
            "Selected {} high-confidence and {} recommendation key points ({:?}, t={temperature})",
            high_confidence.len(),
            recommendation.len(),
            regime
        );

        let mut selected = match regime {
            Regime::Conservative => [high_confidence, recommendation].concat(),
            Regime::Exploratory => [recommendation, high_confidence].concat(),
            Regime::Balanced => {
                let mut all = [high_confidence, recommendation].concat();
                all.sort_by(by_weight);
                all
            }
        };
        selected.truncate(request.limit);
        selected
    }

    /// Highest reputation first, no tag filtering and no temperature.
    fn select_by_reputation<'a>(&self, playbook: &'a Playbook, limit: usize) -> Vec<RankedKeyPoint<'a>> {
        let mut candidates: Vec<&KeyPoint> =
            playbook.key_points.iter().filter(|kp| kp.score >= 0).collect();
        candidates.sort_by(|a, b| compare_by_reputation(a, b));
        candidates.truncate(limit);

        let mut hc_rank = 0;
        let mut rc_rank = 0;
        candidates
            .into_iter()
            .map(|kp| {
                let layer = self.layer_for(kp);
                let layer_rank = match layer {
                    Layer::HighConfidence => {
                        hc_rank += 1;
                        hc_rank
                    }
                    Layer::Recommendation => {
                        rc_rank += 1;
                        rc_rank
                    }
                };
                RankedKeyPoint {
                    key_point: kp,
                    ranking: Ranking {
                        layer,
                        match_score: 0,
                        coverage: 0,
                        prompt_hits: 0,
                        base_weight: kp.score as f64,
                        multiplier: 1.0,
                        weight: kp.score as f64,
                        layer_rank,
                    },
                }
            })
            .collect()
    }

    fn layer_for(&self, kp: &KeyPoint) -> Layer {
        if kp.score >= self.config.high_confidence_threshold {
            Layer::HighConfidence
        } else {
            Layer::Recommendation
        }
    }

    fn regime(&self, temperature: f64) -> Regime {
        if temperature <= self.config.conservative_max {
            Regime::Conservative
        } else if temperature >= self.config.exploratory_min {
            Regime::Exploratory
        } else {
            Regime::Balanced
        }
    }

    fn multiplier(&self, kp: &KeyPoint, layer: Layer, temperature: f64, weights: ContextWeights) -> f64 {
        let regime = self.regime(temperature);
        let signals = &kp.signals;
        match layer {
            Layer::HighConfidence => {
                let mut multiplier = 2.5 - 1.5 * temperature;
                match regime {
                    Regime::Conservative => multiplier += 0.5,
                    Regime::Exploratory => multiplier -= 0.3,
                    Regime::Balanced => {}
                }
                multiplier += signals.effect_rating * weights.effect_weight;
                if signals.risk_level < weights.risk_threshold {
                    multiplier += 0.2;
                }
                multiplier
            }
            Layer::Recommendation => {
                let mut multiplier = 2.0 * temperature;
                match regime {
                    Regime::Conservative => multiplier *= 0.3,
                    Regime::Exploratory => multiplier += 0.5,
                    Regime::Balanced => {}
                }
                multiplier += signals.innovation_level * weights.innovation_weight;
                if signals.risk_level > weights.risk_threshold {
                    multiplier *= 0.8;
                }
                multiplier
            }
        }
    }

    /// Split `limit` into (high-confidence, recommendation) quotas.
    fn allocate(&self, limit: usize, regime: Regime) -> (usize, usize) {
        // 70% of limit without overflowing near usize::MAX
        let favoured = |limit: usize| (limit / 10 * 7 + limit % 10 * 7 / 10).max(4);
        match regime {
            Regime::Conservative => {
                let hc = favoured(limit);
                (hc, limit.saturating_sub(hc).max(1))
            }
            Regime::Exploratory => {
                let rc = favoured(limit);
                (limit.saturating_sub(rc).max(1), rc)
            }
            Regime::Balanced => {
                let hc = limit / 2;
                (hc, limit - hc)
            }
        }
    }
}

fn sanitize_temperature(temperature: f64) -> f64 {
    if temperature.is_nan() {
        DEFAULT_TEMPERATURE
    } else {
        temperature.clamp(0.0, 1.0)
    }
}

fn by_weight(a: &RankedKeyPoint<'_>, b: &RankedKeyPoint<'_>) -> Ordering {
    b.ranking
        .weight
        .total_cmp(&a.ranking.weight)
        .then_with(|| compare_by_reputation(a.key_point, b.key_point))
}

fn top_of_layer(mut layer: Vec<RankedKeyPoint<'_>>, quota: usize) -> Vec<RankedKeyPoint<'_>> {
    layer.sort_by(by_weight);
    layer.truncate(quota);
    for (idx, ranked) in layer.iter_mut().enumerate() {
        ranked.ranking.layer_rank = idx + 1;
    }
    layer
}
