//! Ingest statistics.
//!
//! Counts plays and records flowing into the store. Counters are atomic so
//! the log can be shared with the extraction worker, and can be persisted
//! as JSON so totals survive across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Ingest counters for the current session and, with persistence, all
/// earlier ones.
#[derive(Debug)]
pub struct IngestLog {
    /// Plays whose features were appended
    plays_processed: AtomicU64,
    /// Plays skipped because extraction failed
    plays_failed: AtomicU64,
    /// Feature records written to the store
    records_appended: AtomicU64,
    /// Full rebuilds from history
    rebuilds: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl IngestLog {
    /// Create a new in-memory ingest log.
    pub fn new() -> Self {
        Self {
            plays_processed: AtomicU64::new(0),
            plays_failed: AtomicU64::new(0),
            records_appended: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log backed by `path`, loading earlier totals if present.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            debug!("Could not load previous ingest stats: {e}");
        }

        log
    }

    /// Record a play whose `records` feature records were appended.
    pub fn record_play(&self, records: u64) {
        self.plays_processed.fetch_add(1, Ordering::Relaxed);
        self.records_appended.fetch_add(records, Ordering::Relaxed);
    }

    /// Record a play that was skipped.
    pub fn record_failure(&self) {
        self.plays_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rebuild of the store from history.
    pub fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the counters.
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            plays_processed: self.plays_processed.load(Ordering::Relaxed),
            plays_failed: self.plays_failed.load(Ordering::Relaxed),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Summary for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Ingest Statistics:\n\
             - Plays processed: {}\n\
             - Plays failed: {}\n\
             - Records appended: {}\n\
             - Rebuilds: {}",
            stats.plays_processed, stats.plays_failed, stats.records_appended, stats.rebuilds
        )
    }

    /// Save totals to disk. A log without persistence does nothing.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                plays_processed: stats.plays_processed,
                plays_failed: stats.plays_failed,
                records_appended: stats.records_appended,
                rebuilds: stats.rebuilds,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.plays_processed
                    .store(persisted.plays_processed, Ordering::Relaxed);
                self.plays_failed
                    .store(persisted.plays_failed, Ordering::Relaxed);
                self.records_appended
                    .store(persisted.records_appended, Ordering::Relaxed);
                self.rebuilds.store(persisted.rebuilds, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.plays_processed.store(0, Ordering::Relaxed);
        self.plays_failed.store(0, Ordering::Relaxed);
        self.records_appended.store(0, Ordering::Relaxed);
        self.rebuilds.store(0, Ordering::Relaxed);
    }
}

impl Default for IngestLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of ingest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub plays_processed: u64,
    pub plays_failed: u64,
    pub records_appended: u64,
    pub rebuilds: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    plays_processed: u64,
    plays_failed: u64,
    records_appended: u64,
    #[serde(default)]
    rebuilds: u64,
    last_updated: DateTime<Utc>,
}

/// Ingest log shared between the pipeline and the worker.
pub type SharedIngestLog = Arc<IngestLog>;

/// Create a shared ingest log.
pub fn create_shared_log() -> SharedIngestLog {
    Arc::new(IngestLog::new())
}

/// Create a shared ingest log backed by `path`.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedIngestLog {
    Arc::new(IngestLog::with_persistence(path))
}
