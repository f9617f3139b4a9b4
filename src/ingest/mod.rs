//! Ingest: moving plays from scorepoint files into the feature store.
//!
//! This module contains:
//! - The extraction worker thread
//! - The extract-then-append pipeline and history rebuild
//! - Persistent ingest statistics

pub mod log;
pub mod pipeline;
pub mod worker;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, IngestLog, IngestStats,
    SharedIngestLog,
};
pub use pipeline::{
    collect_plays, rebuild_from_history, FailedPlay, IngestReport, Ingestor, PipelineError,
};
pub use worker::{ExtractionWorker, PlayOutcome, WorkerError};
