//! Extract-then-append over many plays.
//!
//! A play whose scorepoints are invalid is logged and skipped; the rest of
//! the batch still reaches the store. Storage and archive failures, and
//! extractor shape mismatches, abort the run.

use crate::core::{FeatureError, FeatureTableAssembler};
use crate::history::{HistoryError, ScorepointHistory};
use crate::ingest::log::SharedIngestLog;
use crate::ingest::worker::{ExtractionWorker, PlayOutcome, WorkerError};
use crate::scorepoint::{read_scorepoints, split_plays, LoadError, Play, PlayKey};
use crate::store::{FeatureStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("feature extraction for {key} failed: {source}")]
    Extraction {
        key: PlayKey,
        #[source]
        source: FeatureError,
    },
}

/// A play that was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPlay {
    pub key: PlayKey,
    pub reason: String,
}

/// What one ingest run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub plays_appended: usize,
    pub records_appended: usize,
    pub failed: Vec<FailedPlay>,
}

/// Read scorepoint files and group their contents into plays.
pub fn collect_plays<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Play>, LoadError> {
    let mut points = Vec::new();
    for path in paths {
        points.extend(read_scorepoints(path.as_ref())?);
    }
    Ok(split_plays(points))
}

/// Drives extraction results into a store.
pub struct Ingestor<'a> {
    store: &'a mut FeatureStore,
    log: SharedIngestLog,
    history: Option<&'a ScorepointHistory>,
}

impl<'a> Ingestor<'a> {
    /// Create an ingestor appending to `store`.
    pub fn new(store: &'a mut FeatureStore, log: SharedIngestLog) -> Self {
        Self {
            store,
            log,
            history: None,
        }
    }

    /// Archive every successfully extracted play.
    pub fn with_history(mut self, history: &'a ScorepointHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Handle the outcome of one play.
    pub fn accept(
        &mut self,
        outcome: PlayOutcome,
        report: &mut IngestReport,
    ) -> Result<(), PipelineError> {
        let PlayOutcome { play, result } = outcome;
        let table = match result {
            Ok(table) => table,
            Err(source @ FeatureError::ShapeMismatch { .. }) => {
                return Err(PipelineError::Extraction {
                    key: play.key,
                    source,
                });
            }
            Err(err) => {
                warn!("Skipping play {}: {err}", play.key);
                self.log.record_failure();
                report.failed.push(FailedPlay {
                    key: play.key,
                    reason: err.to_string(),
                });
                return Ok(());
            }
        };

        // The archive must never lag behind the store.
        if let Some(history) = self.history {
            history.append_play(&play)?;
        }
        let written = self.store.append(&table)?;

        self.log.record_play(written as u64);
        report.plays_appended += 1;
        report.records_appended += written;
        Ok(())
    }

    /// Extract and append on the current thread.
    pub fn run(
        &mut self,
        assembler: &FeatureTableAssembler,
        plays: Vec<Play>,
    ) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport::default();
        for play in plays {
            let result = assembler.assemble(&play.scorepoints);
            self.accept(PlayOutcome { play, result }, &mut report)?;
        }
        info!(
            "Ingested {} plays ({} records, {} skipped)",
            report.plays_appended,
            report.records_appended,
            report.failed.len()
        );
        Ok(report)
    }

    /// Extract on `worker`, append here.
    pub fn run_on_worker(
        &mut self,
        worker: &ExtractionWorker,
        plays: Vec<Play>,
    ) -> Result<IngestReport, PipelineError> {
        let submitted = plays.len();
        for play in plays {
            worker.submit(play)?;
        }

        let mut report = IngestReport::default();
        for _ in 0..submitted {
            let outcome = worker.recv()?;
            self.accept(outcome, &mut report)?;
        }
        info!(
            "Ingested {} plays on worker ({} records, {} skipped)",
            report.plays_appended,
            report.records_appended,
            report.failed.len()
        );
        Ok(report)
    }
}

/// Drop the store and recompute every feature table from the archive.
///
/// Works from any store state, so it is also the way out of a corrupted or
/// stale store.
pub fn rebuild_from_history(
    store: &mut FeatureStore,
    history: &ScorepointHistory,
    assembler: &FeatureTableAssembler,
    log: SharedIngestLog,
) -> Result<IngestReport, PipelineError> {
    let plays = history.load_plays()?;
    info!(
        "Rebuilding feature store from {} archived plays",
        plays.len()
    );

    store.drop_and_recreate()?;
    let report = Ingestor::new(store, log.clone()).run(assembler, plays)?;
    store.reindex()?;
    log.record_rebuild();

    Ok(report)
}
