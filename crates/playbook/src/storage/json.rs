//! JSON-backed knowledge store
//!
//! Loading is tolerant: a missing, corrupt or structurally invalid document
//! yields an empty playbook instead of an error, legacy bare-string entries
//! are upgraded and divider sentinels are skipped. Saving is strict: the
//! document is written to a temporary file in the target directory and
//! atomically renamed over the target, and any failure reaches the caller.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{PlaybookError, Result};
use crate::memory::quality::{fill_missing, infer_for_text};
use crate::memory::tags::{infer_tags_from_text, normalize_tags};
use crate::memory::types::{
    DEFAULT_MAX_TAGS, DIVIDER_TEXT, EVICTION_FLOOR, KeyPoint, PLAYBOOK_VERSION, Playbook,
};

/// File-backed store for a single playbook document
#[derive(Debug, Clone)]
pub struct PlaybookStore {
    path: PathBuf,
    max_tags: usize,
    eviction_floor: i64,
}

impl PlaybookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_tags: DEFAULT_MAX_TAGS,
            eviction_floor: EVICTION_FLOOR,
        }
    }

    /// Cap applied to tags of loaded and saved key points
    pub fn with_max_tags(mut self, max_tags: usize) -> Self {
        self.max_tags = max_tags;
        self
    }

    /// Key points scoring at or below this are never written
    pub fn with_eviction_floor(mut self, eviction_floor: i64) -> Self {
        self.eviction_floor = eviction_floor;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the playbook, degrading to an empty one on any problem.
    pub fn load(&self) -> Playbook {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No playbook at {}, starting empty", self.path.display());
                return Playbook::default();
            }
            Err(e) => {
                warn!("Failed to read playbook {}: {e}", self.path.display());
                return Playbook::default();
            }
        };

        match decode_document(&contents, self.max_tags) {
            Ok(playbook) => {
                debug!(
                    "Loaded {} key points from {}",
                    playbook.len(),
                    self.path.display()
                );
                playbook
            }
            Err(e) => {
                warn!(
                    "Playbook {} is unusable, starting empty: {e}",
                    self.path.display()
                );
                Playbook::default()
            }
        }
    }

    /// Persist the playbook atomically.
    ///
    /// Key points with empty text or a score at or below the eviction floor
    /// are dropped and tags are normalized as on load. Stable key points are
    /// written before pending ones and identifiers are renumbered in that
    /// order; the caller's playbook is updated to match what was written.
    pub fn save(&self, playbook: &mut Playbook) -> Result<()> {
        let before = playbook.len();
        let (stable, pending): (Vec<KeyPoint>, Vec<KeyPoint>) =
            std::mem::take(&mut playbook.key_points)
                .into_iter()
                .filter_map(|kp| self.prepare_for_save(kp))
                .partition(|kp| !kp.pending);
        playbook.key_points = stable;
        playbook.key_points.extend(pending);
        playbook.renumber();
        if playbook.len() < before {
            debug!(
                "Dropped {} key points with empty text or score <= {} before saving",
                before - playbook.len(),
                self.eviction_floor
            );
        }
        playbook.last_updated = Some(chrono::Utc::now().to_rfc3339());

        let contents = serde_json::to_string_pretty(&encode_document(playbook)?)?;
        self.write_atomic(contents.as_bytes())?;

        info!(
            "Saved {} key points to {}",
            playbook.len(),
            self.path.display()
        );
        Ok(())
    }

    fn prepare_for_save(&self, mut kp: KeyPoint) -> Option<KeyPoint> {
        let text = kp.text.trim().to_string();
        if text.is_empty() || kp.score <= self.eviction_floor {
            return None;
        }
        kp.text = text;
        kp.tags = normalize_tags(&kp.tags, self.max_tags);
        if kp.tags.is_empty() {
            kp.tags = normalize_tags(&infer_tags_from_text(&kp.text), self.max_tags);
        }
        kp.signals = kp.signals.sanitized();
        Some(kp)
    }

    fn write_atomic(&self, contents: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| {
            PlaybookError::Storage(format!("Failed to create {}: {e}", dir.display()))
        })?;

        // The temp file is removed on drop if any step below fails
        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| PlaybookError::Storage(format!("Failed to create temp file: {e}")))?;
        tmp.write_all(contents)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| PlaybookError::Storage(format!("Failed to write temp file: {e}")))?;
        tmp.persist(&self.path).map_err(|e| {
            PlaybookError::Storage(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}

/// Serialize a playbook into its on-disk document, inserting the divider
/// sentinel before the first pending key point.
pub fn encode_document(playbook: &Playbook) -> Result<Value> {
    let mut entries: Vec<Value> = Vec::with_capacity(playbook.len() + 1);
    let mut divider_written = false;
    for kp in &playbook.key_points {
        if kp.pending && !divider_written {
            entries.push(json!({"divider": true, "text": DIVIDER_TEXT}));
            divider_written = true;
        }
        entries.push(serde_json::to_value(kp)?);
    }

    Ok(json!({
        "version": playbook.version,
        "last_updated": playbook.last_updated,
        "key_points": entries,
    }))
}

/// Parse and validate a playbook document.
///
/// Structural problems are errors; individual entries with empty text,
/// divider sentinels and entries that are neither strings nor objects are
/// skipped.
pub fn decode_document(contents: &str, max_tags: usize) -> Result<Playbook> {
    let value: Value = serde_json::from_str(contents)?;
    let Value::Object(document) = value else {
        return Err(invalid("document is not an object"));
    };

    let version = match document.get("version") {
        Some(Value::String(v)) => v.clone(),
        _ => PLAYBOOK_VERSION.to_string(),
    };
    let last_updated = document
        .get("last_updated")
        .and_then(Value::as_str)
        .map(str::to_string);

    let entries = match document.get("key_points") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries.clone(),
        Some(_) => return Err(invalid("key_points is not an array")),
    };

    let mut key_points: Vec<KeyPoint> = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        match entry {
            Value::String(text) => {
                if let Some(kp) = decode_legacy(&text, max_tags) {
                    key_points.push(kp);
                }
            }
            Value::Object(fields) => {
                if fields.get("divider").and_then(Value::as_bool) == Some(true) {
                    continue;
                }
                if let Some(kp) = decode_entry(&fields, max_tags)
                    .map_err(|e| invalid(&format!("entry {idx}: {e}")))?
                {
                    key_points.push(kp);
                }
            }
            other => debug!("Skipping unsupported playbook entry {idx}: {other}"),
        }
    }

    let mut playbook = Playbook {
        version,
        last_updated,
        key_points,
    };
    assign_missing_ids(&mut playbook);
    Ok(playbook)
}

fn invalid(reason: &str) -> PlaybookError {
    PlaybookError::Storage(format!("invalid playbook document: {reason}"))
}

fn decode_legacy(text: &str, max_tags: usize) -> Option<KeyPoint> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let tags = normalize_tags(&infer_tags_from_text(text), max_tags);
    Some(KeyPoint::new(String::new(), text, 0, tags).with_signals(infer_for_text(text)))
}

/// Decode one object entry; `Ok(None)` means the entry is skipped.
fn decode_entry(
    fields: &Map<String, Value>,
    max_tags: usize,
) -> std::result::Result<Option<KeyPoint>, String> {
    let text = match present(fields, "text") {
        None => return Ok(None),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(_) => return Err("text is not a string".to_string()),
    };
    if text.is_empty() {
        return Ok(None);
    }

    let id = match present(fields, "id").or_else(|| present(fields, "name")) {
        None => String::new(),
        Some(Value::String(id)) => id.clone(),
        Some(_) => return Err("id is not a string".to_string()),
    };

    let score = match present(fields, "score") {
        None => 0,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(score) => score,
            None => n.as_f64().map_or(0, |f| f.round() as i64),
        },
        Some(_) => return Err("score is not a number".to_string()),
    };

    let raw_tags: Vec<String> = match present(fields, "tags") {
        None => Vec::new(),
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        Some(_) => return Err("tags is not an array".to_string()),
    };
    let mut tags = normalize_tags(&raw_tags, max_tags);
    if tags.is_empty() {
        tags = normalize_tags(&infer_tags_from_text(&text), max_tags);
    }

    let pending = match present(fields, "pending") {
        None => false,
        Some(Value::Bool(pending)) => *pending,
        Some(_) => return Err("pending is not a boolean".to_string()),
    };

    let effect_rating = signal(fields, "effect_rating", 0.0, 1.0)?;
    let risk_level = signal(fields, "risk_level", -1.0, 1.0)?;
    let innovation_level = signal(fields, "innovation_level", 0.0, 1.0)?;
    let signals = fill_missing(&text, score, &tags, effect_rating, risk_level, innovation_level);

    Ok(Some(KeyPoint {
        id,
        text,
        score,
        tags,
        pending,
        signals,
    }))
}

/// A field that is present and not null
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn signal(
    fields: &Map<String, Value>,
    key: &str,
    min: f64,
    max: f64,
) -> std::result::Result<Option<f64>, String> {
    match present(fields, key) {
        None => Ok(None),
        Some(value) => match value.as_f64() {
            Some(v) if (min..=max).contains(&v) => Ok(Some(v)),
            Some(v) => Err(format!("{key} {v} outside [{min}, {max}]")),
            None => Err(format!("{key} is not a number")),
        },
    }
}

/// Give entries stored without an identifier (legacy strings, id-less
/// objects) the next free sequential one.
fn assign_missing_ids(playbook: &mut Playbook) {
    for idx in 0..playbook.key_points.len() {
        if playbook.key_points[idx].id.is_empty() {
            let id = playbook.next_id();
            playbook.key_points[idx].id = id;
        }
    }
}
