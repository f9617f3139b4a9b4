//! Background feature extraction.
//!
//! Plays are handed to a dedicated thread over a bounded channel; every
//! submitted play produces exactly one [`PlayOutcome`] on the results
//! channel, in submission order. The store never leaves the caller's
//! thread.

use crate::core::{FeatureError, FeatureTable, FeatureTableAssembler};
use crate::scorepoint::Play;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to start extraction thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("extraction worker has stopped")]
    Disconnected,
    #[error("extraction worker panicked")]
    Panicked,
}

/// Result of extracting one play.
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    pub play: Play,
    pub result: Result<FeatureTable, FeatureError>,
}

/// A named thread running [`FeatureTableAssembler::assemble`] on submitted plays.
pub struct ExtractionWorker {
    jobs: Option<Sender<Play>>,
    results: Receiver<PlayOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl ExtractionWorker {
    /// Start the worker. At most `capacity` plays wait in the queue;
    /// [`ExtractionWorker::submit`] blocks beyond that.
    pub fn spawn(assembler: FeatureTableAssembler, capacity: usize) -> Result<Self, WorkerError> {
        let (job_tx, job_rx) = bounded::<Play>(capacity.max(1));
        // Unbounded: the worker must not block while the caller is still submitting.
        let (result_tx, result_rx) = unbounded();

        let handle = thread::Builder::new()
            .name("feature-extractor".to_string())
            .spawn(move || run(assembler, job_rx, result_tx))
            .map_err(WorkerError::Spawn)?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Queue a play for extraction.
    pub fn submit(&self, play: Play) -> Result<(), WorkerError> {
        let jobs = self.jobs.as_ref().ok_or(WorkerError::Disconnected)?;
        jobs.send(play).map_err(|_| WorkerError::Disconnected)
    }

    /// Wait for the next outcome.
    pub fn recv(&self) -> Result<PlayOutcome, WorkerError> {
        self.results.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Receiver for outcomes, for non-blocking polling.
    pub fn results(&self) -> &Receiver<PlayOutcome> {
        &self.results
    }

    /// Stop accepting plays and wait for queued ones to finish. Outcomes
    /// already produced stay readable from [`ExtractionWorker::results`].
    pub fn shutdown(&mut self) -> Result<(), WorkerError> {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| WorkerError::Panicked)?;
            debug!("Extraction worker stopped");
        }
        Ok(())
    }
}

impl Drop for ExtractionWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to stop extraction worker: {e}");
        }
    }
}

fn run(assembler: FeatureTableAssembler, jobs: Receiver<Play>, results: Sender<PlayOutcome>) {
    for play in jobs.iter() {
        let result = assembler.assemble(&play.scorepoints);
        if results.send(PlayOutcome { play, result }).is_err() {
            // Nobody is listening any more.
            break;
        }
    }
}
