//! Reading scorepoint files and splitting them into plays.
//!
//! The alignment engine writes either a JSON array of scorepoints (`.json`)
//! or one scorepoint per line (`.jsonl`). A file may hold several plays.

use crate::scorepoint::types::{Play, PlayKey, Scorepoint};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading scorepoint input.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: invalid scorepoint: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Read every scorepoint from a `.json` or `.jsonl` file.
pub fn read_scorepoints(path: &Path) -> Result<Vec<Scorepoint>, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if is_json_lines(path) {
        parse_json_lines(&content, path)
    } else {
        serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })
    }
}

/// Parse JSON Lines content; blank lines are skipped.
pub fn parse_json_lines<T: DeserializeOwned>(
    content: &str,
    origin: &Path,
) -> Result<Vec<T>, LoadError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).map_err(|source| LoadError::Parse {
                path: origin.to_path_buf(),
                line: number + 1,
                source,
            })
        })
        .collect()
}

fn is_json_lines(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"))
        .unwrap_or(false)
}

/// Group a mixed scorepoint sequence into plays.
///
/// Plays come out in order of first appearance; scorepoints inside a play
/// are ordered by `index`. No other validation happens here.
pub fn split_plays(points: Vec<Scorepoint>) -> Vec<Play> {
    let mut order: Vec<PlayKey> = Vec::new();
    let mut grouped: HashMap<PlayKey, Vec<Scorepoint>> = HashMap::new();

    for point in points {
        let key = point.play_key();
        match grouped.get_mut(&key) {
            Some(group) => group.push(point),
            None => {
                order.push(key.clone());
                grouped.insert(key, vec![point]);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let mut scorepoints = grouped.remove(&key)?;
            scorepoints.sort_by_key(|p| p.index);
            Some(Play { key, scorepoints })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorepoint::types::{ActionType, ResultType};

    fn point(hash: &str, index: u32, time: f64) -> Scorepoint {
        let key = PlayKey::new(hash, 100, 0);
        Scorepoint::new(&key, index, ActionType::Press, ResultType::HitPress, time, 0.0, 0.0)
    }

    #[test]
    fn test_split_plays_keeps_first_appearance_order() {
        let points = vec![
            point("b", 1, 10.0),
            point("a", 0, 0.0),
            point("b", 0, 0.0),
            point("a", 1, 10.0),
        ];

        let plays = split_plays(points);
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].key.map_hash, "b");
        assert_eq!(plays[1].key.map_hash, "a");

        let indices: Vec<u32> = plays[0].scorepoints.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_parse_json_lines_reports_line_number() {
        let good = serde_json::to_string(&point("a", 0, 0.0)).unwrap();
        let content = format!("{good}\n\n{{\"mapHash\": 1}}\n");

        let err = parse_json_lines::<Scorepoint>(&content, Path::new("plays.jsonl")).unwrap_err();
        match err {
            LoadError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_json_array_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let points = vec![point("a", 0, 0.0), point("a", 1, 250.0)];

        let array_path = dir.path().join("play.json");
        std::fs::write(&array_path, serde_json::to_string(&points).unwrap()).unwrap();
        assert_eq!(read_scorepoints(&array_path).unwrap(), points);

        let lines_path = dir.path().join("play.jsonl");
        let lines: Vec<String> = points
            .iter()
            .map(|p| serde_json::to_string(p).unwrap())
            .collect();
        std::fs::write(&lines_path, lines.join("\n")).unwrap();
        assert_eq!(read_scorepoints(&lines_path).unwrap(), points);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_scorepoints(Path::new("/nonexistent/plays.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
