//! Timestamped diagnostic dumps

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;

/// Writes `<dir>/<YYYYmmdd_HHMMSS_mmm>_<name>.txt` files when enabled.
///
/// A dump never replaces an earlier one; a numeric suffix is added when the
/// timestamped name is taken. Write failures are logged and otherwise
/// ignored.
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    dir: Option<PathBuf>,
}

impl DiagnosticSink {
    /// A sink that writes into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn from_config(config: &Config) -> Self {
        if config.diagnostics.enabled {
            Self::new(config.diagnostics_dir())
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Write a dump, returning its path when one was written
    pub fn record(&self, name: &str, content: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let mut path = dir.join(format!("{timestamp}_{name}.txt"));

        let written = std::fs::create_dir_all(dir).and_then(|_| {
            let mut attempt = 1;
            loop {
                match write_new(&path, content) {
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        attempt += 1;
                        path = dir.join(format!("{timestamp}_{name}_{attempt}.txt"));
                    }
                    other => return other,
                }
            }
        });
        match written {
            Ok(()) => {
                debug!("Wrote diagnostic {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to write diagnostic {}: {e}", path.display());
                None
            }
        }
    }
}

fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(content.as_bytes())
}
