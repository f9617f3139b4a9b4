//! Integration tests for the feature store

use beatmap_features::core::{extract_features, FeatureColumn, FeatureRecord, FeatureTable};
use beatmap_features::scorepoint::{ActionType, PlayKey, ResultType, Scorepoint};
use beatmap_features::store::{
    FeatureStore, KeyRange, PlayFilter, StoreError, StoreState, FEATURE_SCHEMA_VERSION,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

fn store_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("features.db")
}

fn play_points(key: &PlayKey, times: &[f64]) -> Vec<Scorepoint> {
    times
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            Scorepoint::new(
                key,
                i as u32,
                ActionType::Press,
                ResultType::HitPress,
                t,
                (i as f64) * 64.0,
                192.0,
            )
            .with_play_constants(800.0, 30.0)
        })
        .collect()
}

fn sample_table(key: &PlayKey) -> FeatureTable {
    extract_features(&play_points(key, &[0.0, 500.0, 1000.0, 1500.0, 1750.0])).unwrap()
}

fn open_fresh(path: &Path) -> FeatureStore {
    let store = FeatureStore::open_at(path).unwrap();
    assert_eq!(store.state(), StoreState::Open);
    store
}

#[test]
fn test_fresh_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_fresh(&store_path(&dir));

    assert!(store.is_empty().unwrap());
    assert_eq!(store.entry_count().unwrap(), 0);
    assert_eq!(store.schema_version().unwrap(), Some(FEATURE_SCHEMA_VERSION));
    assert!(store.plays().unwrap().is_empty());
}

#[test]
fn test_append_query_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_fresh(&store_path(&dir));

    let key = PlayKey::new("abcdef", 1_700_000_000, 16);
    let table = sample_table(&key);
    assert_eq!(store.append(&table).unwrap(), table.len());

    let queried = store.query(&PlayFilter::for_play(&key)).unwrap();
    assert_eq!(queried, table);
    // Missing values come back missing, not zero.
    assert_eq!(queried.records()[0].get(FeatureColumn::PressInterval), None);
    assert_eq!(queried.records()[0].get(FeatureColumn::Distance), Some(0.0));
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    let key = PlayKey::new("persist", 5, 0);
    let table = sample_table(&key);

    let mut store = open_fresh(&path);
    store.append(&table).unwrap();
    store.close().unwrap();
    assert_eq!(store.state(), StoreState::Closed);

    store.open().unwrap();
    assert_eq!(store.query(&PlayFilter::all()).unwrap(), table);
}

#[test]
fn test_duplicate_key_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_fresh(&store_path(&dir));
    let key = PlayKey::new("dup", 1, 0);

    let mut first = FeatureRecord::new(&key, 0);
    first.distance = Some(10.0);
    let mut second = FeatureRecord::new(&key, 0);
    second.distance = Some(20.0);

    store
        .append(&FeatureTable::from_records(vec![first]))
        .unwrap();
    store
        .append(&FeatureTable::from_records(vec![second.clone()]))
        .unwrap();

    assert_eq!(store.entry_count().unwrap(), 1);
    let records = store.query(&PlayFilter::all()).unwrap().into_records();
    assert_eq!(records, vec![second]);
}

#[test]
fn test_query_predicates_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_fresh(&store_path(&dir));

    let keys = [
        PlayKey::new("b", 300, 0),
        PlayKey::new("a", 200, 64),
        PlayKey::new("a", 100, 0),
        PlayKey::new("a", 100, 8),
    ];
    for key in &keys {
        store
            .append(&FeatureTable::from_records(vec![
                FeatureRecord::new(key, 1),
                FeatureRecord::new(key, 0),
            ]))
            .unwrap();
    }

    let all = store.query(&PlayFilter::all()).unwrap();
    let order: Vec<(String, i64, u32, u32)> = all
        .iter()
        .map(|r| (r.map_hash.clone(), r.timestamp, r.mod_mask, r.index))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), 100, 0, 0),
            ("a".to_string(), 100, 0, 1),
            ("a".to_string(), 100, 8, 0),
            ("a".to_string(), 100, 8, 1),
            ("a".to_string(), 200, 64, 0),
            ("a".to_string(), 200, 64, 1),
            ("b".to_string(), 300, 0, 0),
            ("b".to_string(), 300, 0, 1),
        ]
    );

    let by_hash = store
        .query(&PlayFilter::all().map_hash(KeyRange::exact("a".to_string())))
        .unwrap();
    assert_eq!(by_hash.len(), 6);

    let by_range = store
        .query(&PlayFilter::all().timestamp(KeyRange::between(150, 300)))
        .unwrap();
    assert_eq!(by_range.play_keys(), vec![keys[1].clone(), keys[0].clone()]);

    let combined = store
        .query(
            &PlayFilter::all()
                .map_hash(KeyRange::exact("a".to_string()))
                .mod_mask(KeyRange::at_least(8)),
        )
        .unwrap();
    assert_eq!(combined.play_keys(), vec![keys[3].clone(), keys[1].clone()]);

    let none = store
        .query(&PlayFilter::all().timestamp(KeyRange::at_least(1_000)))
        .unwrap();
    assert!(none.is_empty());

    let plays = store.plays().unwrap();
    assert_eq!(plays.len(), 4);
    assert!(plays.iter().all(|p| p.records == 2));
}

#[test]
fn test_reindex_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_fresh(&store_path(&dir));
    let table = sample_table(&PlayKey::new("r", 1, 0));
    store.append(&table).unwrap();

    store.reindex().unwrap();
    assert_eq!(store.query(&PlayFilter::all()).unwrap(), table);
}

#[test]
fn test_garbage_file_is_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    std::fs::write(&path, vec![0xA5u8; 4096]).unwrap();

    let mut store = FeatureStore::new(&path);
    let err = store.open().unwrap_err();
    assert!(matches!(err, StoreError::Corruption { .. }));
    assert!(err.is_recoverable());
    assert_eq!(store.state(), StoreState::Corrupted);

    // Only drop_and_recreate is allowed from here.
    assert!(matches!(
        store.entry_count(),
        Err(StoreError::InvalidState {
            state: StoreState::Corrupted,
            ..
        })
    ));
    assert!(matches!(
        store.close(),
        Err(StoreError::InvalidState { .. })
    ));

    store.drop_and_recreate().unwrap();
    assert_eq!(store.state(), StoreState::Open);
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_missing_table_is_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();
    }

    let mut store = FeatureStore::new(&path);
    match store.open().unwrap_err() {
        StoreError::Corruption { reason, .. } => assert!(reason.contains("missing")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.state(), StoreState::Corrupted);
}

#[test]
fn test_wrong_key_arity_is_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE features (
                map_hash TEXT NOT NULL,
                idx INTEGER NOT NULL,
                distance REAL,
                PRIMARY KEY (map_hash, idx)
            );",
        )
        .unwrap();
    }

    let mut store = FeatureStore::new(&path);
    match store.open().unwrap_err() {
        StoreError::Corruption { reason, .. } => assert!(reason.contains("primary key")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_stale_schema_detected_and_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);

    let mut store = open_fresh(&path);
    store.append(&sample_table(&PlayKey::new("s", 1, 0))).unwrap();
    store.close().unwrap();

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE store_meta SET value = '0' WHERE key = 'feature_schema_version'",
            [],
        )
        .unwrap();
    }

    let err = store.open().unwrap_err();
    match err {
        StoreError::StaleSchema { found, expected } => {
            assert_eq!(found, Some(0));
            assert_eq!(expected, FEATURE_SCHEMA_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.state(), StoreState::Stale);

    store.drop_and_recreate().unwrap();
    assert!(store.is_empty().unwrap());
    assert_eq!(store.schema_version().unwrap(), Some(FEATURE_SCHEMA_VERSION));
}

#[test]
fn test_illegal_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_fresh(&store_path(&dir));

    assert!(matches!(
        store.open(),
        Err(StoreError::InvalidState {
            operation: "open",
            state: StoreState::Open
        })
    ));

    store.close().unwrap();
    assert!(matches!(
        store.append(&FeatureTable::new()),
        Err(StoreError::InvalidState { .. })
    ));
    assert!(matches!(
        store.query(&PlayFilter::all()),
        Err(StoreError::InvalidState { .. })
    ));
}

#[test]
fn test_stores_coexist() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = open_fresh(&dir.path().join("one.db"));
    let second = open_fresh(&dir.path().join("two.db"));

    first.append(&sample_table(&PlayKey::new("x", 1, 0))).unwrap();
    assert!(!first.is_empty().unwrap());
    assert!(second.is_empty().unwrap());
}
