//! Knowledge types for the Playbook system
//!
//! Defines the persisted `KeyPoint` and `Playbook` structures along with the
//! `ExtractionResult` batch handed to the merge engine by an extraction
//! collaborator.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Hard cap on the number of key points a playbook may hold
pub const MAX_KEYPOINTS: usize = 250;

/// Maximum length of a single tag, in characters
pub const MAX_TAG_LEN: usize = 64;

/// Default cap on tags per key point
pub const DEFAULT_MAX_TAGS: usize = 6;

/// Key points with a score at or below this value are evicted
pub const EVICTION_FLOOR: i64 = -5;

/// Version written into new playbook documents
pub const PLAYBOOK_VERSION: &str = "1.0";

/// Text of the sentinel separating stable from pending entries on disk
pub const DIVIDER_TEXT: &str = "--- pending key points below ---";

const KEYPOINT_ID_PREFIX: &str = "kpt_";

/// Format the sequential identifier for the given 1-based position.
pub fn format_keypoint_id(position: usize) -> String {
    format!("{KEYPOINT_ID_PREFIX}{position:03}")
}

/// Numeric part of a sequential identifier (`kpt_012` -> 12).
pub fn keypoint_ordinal(id: &str) -> Option<u32> {
    id.strip_prefix(KEYPOINT_ID_PREFIX)?.parse().ok()
}

/// Order key points by score descending, then by identifier ascending.
///
/// Sequential identifiers compare numerically; any others sort after them,
/// lexicographically.
pub fn compare_by_reputation(a: &KeyPoint, b: &KeyPoint) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| id_sort_key(&a.id).cmp(&id_sort_key(&b.id)))
}

fn id_sort_key(id: &str) -> (bool, u32, &str) {
    match keypoint_ordinal(id) {
        Some(ordinal) => (false, ordinal, id),
        None => (true, 0, id),
    }
}

/// Multi-dimensional quality signals carried by every key point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySignals {
    /// How well the knowledge worked when applied, 0.0-1.0
    pub effect_rating: f64,
    /// Signed risk estimate, -1.0-1.0 (positive = riskier)
    pub risk_level: f64,
    /// How novel the knowledge is, 0.0-1.0
    pub innovation_level: f64,
}

impl Default for QualitySignals {
    fn default() -> Self {
        Self {
            effect_rating: 0.5,
            risk_level: -0.5,
            innovation_level: 0.5,
        }
    }
}

impl QualitySignals {
    pub fn new(effect_rating: f64, risk_level: f64, innovation_level: f64) -> Self {
        Self {
            effect_rating,
            risk_level,
            innovation_level,
        }
    }

    /// Replace every non-finite or out-of-range signal with its default.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let pick = |value: f64, min: f64, max: f64, fallback: f64| {
            if value.is_finite() && (min..=max).contains(&value) {
                value
            } else {
                fallback
            }
        };
        Self {
            effect_rating: pick(self.effect_rating, 0.0, 1.0, defaults.effect_rating),
            risk_level: pick(self.risk_level, -1.0, 1.0, defaults.risk_level),
            innovation_level: pick(self.innovation_level, 0.0, 1.0, defaults.innovation_level),
        }
    }
}

/// A single scored, tagged unit of captured knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    /// Sequential identifier, reassigned on every save
    pub id: String,
    /// The knowledge statement
    pub text: String,
    /// Reputation accumulator
    pub score: i64,
    /// Normalized lowercase ASCII tags
    pub tags: Vec<String>,
    /// True until a merge cycle confirms the item
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
    #[serde(flatten)]
    pub signals: QualitySignals,
}

impl KeyPoint {
    /// Create a confirmed key point with default quality signals
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: i64, tags: Vec<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score,
            tags,
            pending: false,
            signals: QualitySignals::default(),
        }
    }

    /// Mark this key point as awaiting confirmation
    pub fn into_pending(mut self) -> Self {
        self.pending = true;
        self
    }

    /// Set the quality signals
    pub fn with_signals(mut self, signals: QualitySignals) -> Self {
        self.signals = signals;
        self
    }
}

/// The bounded, persisted collection of key points.
#[derive(Debug, Clone, PartialEq)]
pub struct Playbook {
    pub version: String,
    pub last_updated: Option<String>,
    pub key_points: Vec<KeyPoint>,
}

impl Default for Playbook {
    fn default() -> Self {
        Self {
            version: PLAYBOOK_VERSION.to_string(),
            last_updated: None,
            key_points: Vec::new(),
        }
    }
}

impl Playbook {
    pub fn new(key_points: Vec<KeyPoint>) -> Self {
        Self {
            key_points,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.key_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_points.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&KeyPoint> {
        self.key_points.iter().find(|kp| kp.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut KeyPoint> {
        self.key_points.iter_mut().find(|kp| kp.id == id)
    }

    pub fn contains_text(&self, text: &str) -> bool {
        self.key_points.iter().any(|kp| kp.text == text)
    }

    /// Confirmed key points, in order
    pub fn stable(&self) -> impl Iterator<Item = &KeyPoint> {
        self.key_points.iter().filter(|kp| !kp.pending)
    }

    /// Key points awaiting confirmation, in order
    pub fn pending(&self) -> impl Iterator<Item = &KeyPoint> {
        self.key_points.iter().filter(|kp| kp.pending)
    }

    /// Next free sequential identifier, one past the highest in use
    pub fn next_id(&self) -> String {
        let highest = self
            .key_points
            .iter()
            .filter_map(|kp| keypoint_ordinal(&kp.id))
            .max()
            .unwrap_or(0);
        format_keypoint_id(highest as usize + 1)
    }

    /// Reassign identifiers sequentially, 1-based, in current order
    pub fn renumber(&mut self) {
        for (idx, kp) in self.key_points.iter_mut().enumerate() {
            kp.id = format_keypoint_id(idx + 1);
        }
    }

    /// Sorted, de-duplicated set of every tag in use
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .key_points
            .iter()
            .flat_map(|kp| kp.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

/// A knowledge candidate proposed by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawCandidate")]
pub struct CandidateKeyPoint {
    /// Trimmed, non-empty knowledge statement
    pub text: String,
    /// Tags as supplied (normalized during merge)
    pub tags: Vec<String>,
    /// Identifiers of existing key points this candidate subsumes
    pub sources: Vec<String>,
    pub effect_rating: Option<f64>,
    pub risk_level: Option<f64>,
    pub innovation_level: Option<f64>,
}

impl CandidateKeyPoint {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: Vec::new(),
            sources: Vec::new(),
            effect_rating: None,
            risk_level: None,
            innovation_level: None,
        }
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sources<S: Into<String>>(mut self, sources: impl IntoIterator<Item = S>) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_signals(mut self, signals: QualitySignals) -> Self {
        self.effect_rating = Some(signals.effect_rating);
        self.risk_level = Some(signals.risk_level);
        self.innovation_level = Some(signals.innovation_level);
        self
    }

    /// Explicit signals layered over `base`, clamped into range
    pub fn signals_over(&self, base: QualitySignals) -> QualitySignals {
        QualitySignals {
            effect_rating: self
                .effect_rating
                .map_or(base.effect_rating, |v| v.clamp(0.0, 1.0)),
            risk_level: self.risk_level.map_or(base.risk_level, |v| v.clamp(-1.0, 1.0)),
            innovation_level: self
                .innovation_level
                .map_or(base.innovation_level, |v| v.clamp(0.0, 1.0)),
        }
        .sanitized()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCandidate {
    Text(String),
    Detailed {
        text: String,
        #[serde(default)]
        tags: serde_json::Value,
        #[serde(default)]
        sources: serde_json::Value,
        #[serde(default)]
        effect_rating: serde_json::Value,
        #[serde(default)]
        risk_level: serde_json::Value,
        #[serde(default)]
        innovation_level: serde_json::Value,
    },
}

impl TryFrom<RawCandidate> for CandidateKeyPoint {
    type Error = String;

    fn try_from(raw: RawCandidate) -> Result<Self, Self::Error> {
        let candidate = match raw {
            RawCandidate::Text(text) => CandidateKeyPoint::new(text.trim()),
            RawCandidate::Detailed {
                text,
                tags,
                sources,
                effect_rating,
                risk_level,
                innovation_level,
            } => CandidateKeyPoint {
                text: text.trim().to_string(),
                tags: string_list(tags),
                sources: string_list(sources),
                effect_rating: effect_rating.as_f64(),
                risk_level: risk_level.as_f64(),
                innovation_level: innovation_level.as_f64(),
            },
        };

        if candidate.text.is_empty() {
            return Err("candidate text is empty".to_string());
        }
        Ok(candidate)
    }
}

/// Strings from a JSON string or array; anything else yields nothing.
fn string_list(value: serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(s) => vec![s],
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// A rating for an existing key point, produced by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(alias = "name")]
    pub id: String,
    #[serde(default = "default_rating")]
    pub rating: String,
}

impl Evaluation {
    pub fn new(id: impl Into<String>, rating: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rating: rating.into(),
        }
    }
}

fn default_rating() -> String {
    "neutral".to_string()
}

/// Update batch supplied by the extraction collaborator.
///
/// When `merged_key_points` is present the batch is a full, de-duplicated
/// rewrite of the playbook; otherwise `new_key_points` are appended as
/// pending additions. Malformed entries are dropped individually while
/// deserializing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "lenient::optional_entries")]
    pub merged_key_points: Option<Vec<CandidateKeyPoint>>,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub new_key_points: Vec<CandidateKeyPoint>,
    #[serde(default, alias = "score_changes", deserialize_with = "lenient::entries")]
    pub evaluations: Vec<Evaluation>,
}

impl ExtractionResult {
    /// Batch that appends pending additions
    pub fn incremental(new_key_points: Vec<CandidateKeyPoint>) -> Self {
        Self {
            new_key_points,
            ..Self::default()
        }
    }

    /// Batch that rewrites the playbook from a merged list
    pub fn full(merged_key_points: Vec<CandidateKeyPoint>) -> Self {
        Self {
            merged_key_points: Some(merged_key_points),
            ..Self::default()
        }
    }

    pub fn with_evaluations(mut self, evaluations: Vec<Evaluation>) -> Self {
        self.evaluations = evaluations;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.merged_key_points.is_none()
            && self.new_key_points.is_empty()
            && self.evaluations.is_empty()
    }
}

mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::debug;

    pub(super) fn entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(collect(value).unwrap_or_default())
    }

    pub(super) fn optional_entries<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(collect(value))
    }

    fn collect<T: DeserializeOwned>(value: Value) -> Option<Vec<T>> {
        match value {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match serde_json::from_value(item) {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            debug!("Skipping malformed extraction entry: {e}");
                            None
                        }
                    })
                    .collect(),
            ),
            Value::Null => None,
            other => {
                debug!("Ignoring non-list extraction field: {other}");
                None
            }
        }
    }
}
