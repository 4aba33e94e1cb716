//! Extraction collaborator seam
//!
//! An `Extractor` produces the `ExtractionResult` a merge cycle consumes.
//! How it arrives at the result (a language model, a script, a file prepared
//! by hand) is opaque to the core.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PlaybookError, Result};
use crate::memory::types::{ExtractionResult, Playbook};

/// Source of extraction batches
pub trait Extractor {
    /// Produce an extraction batch for the current playbook
    fn extract(&self, playbook: &Playbook) -> Result<ExtractionResult>;

    /// Extractor name for logging
    fn name(&self) -> &'static str;
}

/// What an external extractor is told about the playbook
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionRequest {
    /// Confirmed key points, id to text
    pub existing_playbook: BTreeMap<String, String>,
    /// Pending key points, id to text
    pub pending_playbook: BTreeMap<String, String>,
    /// Every tag in use, sorted
    pub existing_tags: Vec<String>,
}

impl ExtractionRequest {
    pub fn from_playbook(playbook: &Playbook) -> Self {
        let entries = |pending: bool| -> BTreeMap<String, String> {
            playbook
                .key_points
                .iter()
                .filter(|kp| kp.pending == pending)
                .map(|kp| (kp.id.clone(), kp.text.clone()))
                .collect()
        };
        Self {
            existing_playbook: entries(false),
            pending_playbook: entries(true),
            existing_tags: playbook.all_tags(),
        }
    }
}

/// Parse extractor output, accepting raw JSON or JSON inside a markdown fence.
pub fn parse_extraction_response(text: &str) -> Result<ExtractionResult> {
    let json_text = strip_fence(text);
    serde_json::from_str(json_text)
        .map_err(|e| PlaybookError::Extraction(format!("Unparseable extraction output: {e}")))
}

fn strip_fence(text: &str) -> &str {
    let (start, skip) = match (text.find("```json"), text.find("```")) {
        (Some(start), _) => (start, "```json".len()),
        (None, Some(start)) => (start, "```".len()),
        (None, None) => return text.trim(),
    };
    let body = &text[start + skip..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Reads a prepared extraction result from a file
#[derive(Debug, Clone)]
pub struct JsonFileExtractor {
    path: PathBuf,
}

impl JsonFileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Extractor for JsonFileExtractor {
    fn extract(&self, _playbook: &Playbook) -> Result<ExtractionResult> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            PlaybookError::Extraction(format!(
                "Failed to read extraction result {}: {e}",
                self.path.display()
            ))
        })?;
        parse_extraction_response(&contents)
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

/// Runs an external command that receives an `ExtractionRequest` on stdin
/// and prints an extraction result on stdout.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandExtractor {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(PlaybookError::Config(
                "extractor command must name a program".to_string(),
            ));
        }
        Ok(Self {
            argv,
            timeout: Duration::from_secs(120),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, input: Vec<u8>) -> Result<String> {
        let fail = |what: &str, e: std::io::Error| {
            PlaybookError::Extraction(format!("{what} `{}`: {e}", self.argv[0]))
        };

        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| fail("Failed to start", e))?;

        // Drain stdout concurrently so a chatty extractor never blocks on a full pipe
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlaybookError::Extraction("extractor stdout unavailable".to_string()))?;
        let reader = std::thread::spawn(move || {
            let mut output = String::new();
            stdout.read_to_string(&mut output).map(|_| output)
        });

        // A child that never reads stdin must not stall the deadline loop
        let deadline = Instant::now() + self.timeout;
        if let Some(mut stdin) = child.stdin.take() {
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(&input) {
                    warn!("Extractor closed stdin early: {e}");
                }
            });
        }

        let status = loop {
            match child.try_wait().map_err(|e| fail("Failed to wait for", e))? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PlaybookError::Extraction(format!(
                        "`{}` timed out after {}s",
                        self.argv[0],
                        self.timeout.as_secs_f64()
                    )));
                }
                None => std::thread::sleep(Duration::from_millis(25)),
            }
        };

        let output = reader
            .join()
            .map_err(|_| PlaybookError::Extraction("extractor output reader panicked".to_string()))?
            .map_err(|e| fail("Failed to read output of", e))?;

        if !status.success() {
            return Err(PlaybookError::Extraction(format!(
                "`{}` exited with {status}",
                self.argv[0]
            )));
        }
        Ok(output)
    }
}

impl Extractor for CommandExtractor {
    fn extract(&self, playbook: &Playbook) -> Result<ExtractionResult> {
        let request = serde_json::to_vec(&ExtractionRequest::from_playbook(playbook))?;
        debug!(
            "Running extractor `{}` with {} bytes of context",
            self.argv.join(" "),
            request.len()
        );
        let output = self.run(request)?;
        parse_extraction_response(&output)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
