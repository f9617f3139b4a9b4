//! Scorepoint input: the per-note interaction records handed over by the
//! alignment engine, and the loader that turns files into plays.

pub mod loader;
pub mod types;

// Re-export commonly used types
pub use loader::{parse_json_lines, read_scorepoints, split_plays, LoadError};
pub use types::{ActionType, Play, PlayKey, ResultType, Scorepoint};
