//! Destinations for the incremental trace.
//!
//! The orchestrator hands the whole trace to its sink after every step, so a
//! run that dies mid-way still leaves the steps it completed.

use crate::TelemetryError;
use crate::model::RunTrace;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Receives the full trace after every step.
pub trait TraceSink: Send + Sync {
    fn record(&self, trace: &RunTrace) -> Result<(), TelemetryError>;
}

/// Rewrites one JSON file per run, atomically (write to a sibling, then rename).
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "trace.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TraceSink for JsonFileSink {
    fn record(&self, trace: &RunTrace) -> Result<(), TelemetryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TelemetryError::Io(format!("{}: {e}", parent.display())))?;
        }

        let body = serde_json::to_string_pretty(trace)?;
        let staging = self.staging_path();
        std::fs::write(&staging, body)
            .map_err(|e| TelemetryError::Io(format!("{}: {e}", staging.display())))?;
        std::fs::rename(&staging, &self.path)
            .map_err(|e| TelemetryError::Io(format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), steps = trace.steps.len(), "Trace persisted");
        Ok(())
    }
}

/// Keeps every recorded version in memory.
#[derive(Default)]
pub struct MemorySink {
    versions: RwLock<Vec<RunTrace>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the trace was persisted.
    pub fn writes(&self) -> usize {
        self.versions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The most recent version.
    pub fn latest(&self) -> Option<RunTrace> {
        self.versions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// Every version, oldest first.
    pub fn history(&self) -> Vec<RunTrace> {
        self.versions.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TraceSink for MemorySink {
    fn record(&self, trace: &RunTrace) -> Result<(), TelemetryError> {
        self.versions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(trace.clone());
        Ok(())
    }
}
