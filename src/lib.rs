//! Beatmap Features - difficulty features from aligned gameplay scorepoints.
//!
//! This library turns the scorepoint sequence of a recorded play (one row
//! per note interaction, produced by an external replay-to-note alignment)
//! into a table of rhythm, spatial and density features, and accumulates
//! those tables across plays in a persistent store keyed by
//! `(map_hash, timestamp, mod_mask, index)`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Beatmap Features                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌─────────────┐                           │
//! │  │ Scorepoint │──▶ │   Timing    │──┐                        │
//! │  │   Loader   │──▶ │   Spatial   │──┼──▶ ┌──────────────┐    │
//! │  └────────────┘──▶ │ Visibility  │──┘    │  Assembler   │    │
//! │        │           └─────────────┘       └──────────────┘    │
//! │        ▼                                        │            │
//! │  ┌────────────┐    ┌─────────────┐              ▼            │
//! │  │  History   │◀───│   Ingest    │◀──── FeatureTable         │
//! │  │  (JSONL)   │    │  Pipeline   │───▶ ┌──────────────┐      │
//! │  └────────────┘    └─────────────┘     │ FeatureStore │      │
//! │                                        │   (SQLite)   │      │
//! │                                        └──────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Missing feature values are `None` throughout and `NULL` in the store;
//! they are never folded into zero.
//!
//! # Example
//!
//! ```no_run
//! use beatmap_features::{core::extract_features, scorepoint, store};
//!
//! let points = scorepoint::read_scorepoints("play.jsonl".as_ref()).unwrap();
//! let table = extract_features(&points).unwrap();
//!
//! let mut store = store::FeatureStore::open_at("features.db").unwrap();
//! store.append(&table).unwrap();
//! ```

pub mod config;
pub mod core;
pub mod history;
pub mod ingest;
pub mod scorepoint;
pub mod store;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    extract_features, FeatureColumn, FeatureError, FeatureRecord, FeatureTable,
    FeatureTableAssembler,
};
pub use history::{HistoryError, ScorepointHistory};
pub use ingest::{ExtractionWorker, IngestLog, IngestReport, Ingestor, PipelineError};
pub use scorepoint::{ActionType, Play, PlayKey, ResultType, Scorepoint};
pub use store::{FeatureStore, KeyRange, PlayFilter, StoreError, StoreState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
