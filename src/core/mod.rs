//! Feature extraction.
//!
//! This module contains:
//! - Index tables for the note-start and aim subsequences
//! - Timing, spatial and visibility extractors
//! - Assembly of extractor outputs into keyed feature tables
//! - Column statistics for queried tables

pub mod assemble;
pub mod record;
pub mod spatial;
pub mod subsequence;
pub mod summary;
pub mod timing;
pub mod visibility;

// Re-export commonly used types
pub use assemble::{
    extract_features, FeatureError, FeatureTableAssembler, DEFAULT_APPROACH_WINDOW_MS,
};
pub use record::{Column, FeatureColumn, FeatureRecord, FeatureTable};
pub use spatial::{compute_spatial, extract_spatial, AimPoint, SpatialFeatures};
pub use subsequence::Subsequence;
pub use summary::{summarize, summarize_column, ColumnSummary};
pub use timing::{compute_timing, extract_timing, TempoEdge, TempoTracker, TimingFeatures};
pub use visibility::{compute_visibility, extract_visibility};
