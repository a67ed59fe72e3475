//! Append-only audit log with optional JSON persistence.

use crate::error::StoreError;
use parking_lot::RwLock;
use statomic_core::{AuditSink, BoxError, TransitionEvent};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// In-memory audit log, optionally persisted to a JSON file.
///
/// Appends are in-memory; `persist` flushes the full log to disk. A log
/// opened with [`AuditLog::with_persistence`] loads whatever the file
/// already holds.
pub struct AuditLog {
    entries: RwLock<Vec<TransitionEvent>>,
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    /// Creates a purely in-memory log.
    pub fn new() -> Self {
        AuditLog {
            entries: RwLock::new(Vec::new()),
            persist_path: None,
        }
    }

    /// Creates a log persisted at `path`, loading any existing events.
    pub fn with_persistence(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let log = AuditLog {
            entries: RwLock::new(Vec::new()),
            persist_path: Some(path.clone()),
        };

        if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let entries: Vec<TransitionEvent> = serde_json::from_reader(reader)?;
            tracing::info!(
                path = %path.display(),
                events = entries.len(),
                "loaded audit log"
            );
            *log.entries.write() = entries;
        }

        Ok(log)
    }

    pub fn append(&self, event: TransitionEvent) {
        self.entries.write().push(event);
    }

    /// All events, oldest first.
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.entries.read().clone()
    }

    /// Events of a single owner, newest first.
    pub fn for_owner(&self, kind: &str, id: &str) -> Vec<TransitionEvent> {
        self.entries
            .read()
            .iter()
            .rev()
            .filter(|e| e.owner_kind == kind && e.owner_id == id)
            .cloned()
            .collect()
    }

    /// The most recent events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<TransitionEvent> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Flushes every event to the persistence path, when one is set.
    pub fn persist(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.persist_path {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer(writer, &*self.entries.read())?;
        }
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: &TransitionEvent) -> Result<(), BoxError> {
        self.append(event.clone());
        Ok(())
    }
}
