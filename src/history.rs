//! Append-only archive of ingested scorepoints.
//!
//! Every play that reaches the store is also written here as JSON Lines.
//! After a store is dropped (corruption, or a new extractor version) the
//! archive is replayed to recompute every feature table.

use crate::scorepoint::{parse_json_lines, split_plays, LoadError, Play, PlayKey, Scorepoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to write scorepoint history {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode scorepoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One archived line: a scorepoint tagged with the append call that wrote it.
#[derive(Debug, Serialize, Deserialize)]
struct ArchivedPoint {
    /// Archive length in bytes when the batch started; unique per append.
    #[serde(default)]
    batch: u64,
    #[serde(flatten)]
    point: Scorepoint,
}

/// Scorepoint archive at a fixed path.
#[derive(Debug, Clone)]
pub struct ScorepointHistory {
    path: PathBuf,
}

impl ScorepointHistory {
    /// Create a handle; nothing is written until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether anything has been archived yet.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append every scorepoint of `play`, one JSON object per line.
    pub fn append_play(&self, play: &Play) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        let batch = file.metadata().map_err(io_err)?.len();
        let mut writer = BufWriter::new(file);

        for point in &play.scorepoints {
            let line = ArchivedPoint {
                batch,
                point: point.clone(),
            };
            serde_json::to_writer(&mut writer, &line)?;
            writer.write_all(b"\n").map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;
        Ok(())
    }

    /// Every archived play, in the order its latest copy was appended. A
    /// missing archive holds no plays. A play archived more than once comes
    /// back exactly as its latest append wrote it.
    pub fn load_plays(&self) -> Result<Vec<Play>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        let lines: Vec<ArchivedPoint> = parse_json_lines(&content, &self.path)?;
        Ok(split_plays(latest_batches(lines)))
    }
}

/// Drop every line that belongs to an older batch of the same play.
fn latest_batches(lines: Vec<ArchivedPoint>) -> Vec<Scorepoint> {
    let mut latest: HashMap<PlayKey, u64> = HashMap::new();
    for line in &lines {
        let batch = latest.entry(line.point.play_key()).or_insert(line.batch);
        *batch = (*batch).max(line.batch);
    }

    lines
        .into_iter()
        .filter(|line| latest.get(&line.point.play_key()) == Some(&line.batch))
        .map(|line| line.point)
        .collect()
}
