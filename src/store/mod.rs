//! Persistent, composite-keyed feature store.
//!
//! Records accumulate across plays in a single SQLite file keyed by
//! `(map_hash, timestamp, mod_mask, index)`. Appends are last-write-wins
//! per key and one `append` call is one transaction. The store has a single
//! writer; callers serialize access.
//!
//! Lifecycle:
//!
//! ```text
//! Closed --open--> Opening --+--> Open --close--> Closed
//!                            +--> Corrupted --drop_and_recreate--> Open
//!                            +--> Stale     --drop_and_recreate--> Open
//! ```

pub mod query;
pub mod schema;

pub use query::{KeyRange, PlayFilter};
pub use schema::{FEATURE_SCHEMA_VERSION, LAYOUT_VERSION};

use crate::core::{FeatureColumn, FeatureRecord, FeatureTable};
use crate::scorepoint::PlayKey;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by the feature store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file is not a feature store: unreadable, a table is missing, or
    /// the key has the wrong shape.
    #[error("feature store {path} is corrupted: {reason}")]
    Corruption { path: PathBuf, reason: String },
    /// Values were produced by a different version of the extractors.
    #[error("feature store holds schema version {}, expected {expected}", display_version(.found))]
    StaleSchema { found: Option<u32>, expected: u32 },
    #[error("cannot {operation} while the store is {state}")]
    InvalidState {
        operation: &'static str,
        state: StoreState,
    },
    #[error("no migration to layout version {version}")]
    UnknownMigration { version: i32 },
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_version(version: &Option<u32>) -> String {
    version.map_or_else(|| "none".to_string(), |v| v.to_string())
}

impl StoreError {
    /// Whether `drop_and_recreate` followed by recomputation fixes this.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::Corruption { .. } | StoreError::StaleSchema { .. }
        )
    }
}

/// Lifecycle state of a [`FeatureStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Closed,
    Opening,
    Open,
    Corrupted,
    Stale,
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreState::Closed => "closed",
            StoreState::Opening => "opening",
            StoreState::Open => "open",
            StoreState::Corrupted => "corrupted",
            StoreState::Stale => "stale",
        };
        f.write_str(name)
    }
}

/// Number of records stored for one play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPlay {
    pub key: PlayKey,
    pub records: usize,
}

/// Feature store backed by one SQLite file.
#[derive(Debug)]
pub struct FeatureStore {
    path: PathBuf,
    state: StoreState,
    conn: Option<Connection>,
}

impl FeatureStore {
    /// Create a closed handle for the store at `path`. Nothing touches the
    /// file until [`FeatureStore::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: StoreState::Closed,
            conn: None,
        }
    }

    /// Create a handle and open it in one step.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self::new(path);
        store.open()?;
        Ok(store)
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Open the store, creating an empty one if the file does not exist.
    ///
    /// On a corrupted or stale file the store moves to
    /// [`StoreState::Corrupted`] or [`StoreState::Stale`] and the error is
    /// returned; [`FeatureStore::drop_and_recreate`] is then the only way
    /// forward.
    pub fn open(&mut self) -> Result<(), StoreError> {
        self.require(StoreState::Closed, "open")?;
        self.state = StoreState::Opening;

        match open_connection(&self.path) {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = StoreState::Open;
                info!("Feature store open at {}", self.path.display());
                Ok(())
            }
            Err(err) => {
                self.state = match err {
                    StoreError::Corruption { .. } => StoreState::Corrupted,
                    StoreError::StaleSchema { .. } => StoreState::Stale,
                    _ => StoreState::Closed,
                };
                warn!("Failed to open feature store: {err}");
                Err(err)
            }
        }
    }

    /// Close the store and release the file.
    pub fn close(&mut self) -> Result<(), StoreError> {
        self.require(StoreState::Open, "close")?;
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| StoreError::Sqlite(err))?;
        }
        self.state = StoreState::Closed;
        debug!("Feature store closed");
        Ok(())
    }

    /// Write every record of `table` in one transaction. Existing records
    /// with the same key are replaced.
    pub fn append(&mut self, table: &FeatureTable) -> Result<usize, StoreError> {
        let conn = self.connection_mut("append")?;
        let sql = insert_sql();

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for record in table {
                stmt.execute(params![
                    record.map_hash,
                    record.timestamp,
                    record.mod_mask,
                    record.index,
                    record.press_interval,
                    record.press_interval3,
                    record.time_since_tempo_increase,
                    record.time_since_tempo_decrease,
                    record.rhythm_ratio,
                    record.hold_duration,
                    record.distance,
                    record.angle,
                    record.linear_velocity,
                    record.angular_velocity,
                    record.visible_count,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Appended {} feature records", table.len());
        Ok(table.len())
    }

    /// Records matching `filter`, in key order.
    pub fn query(&self, filter: &PlayFilter) -> Result<FeatureTable, StoreError> {
        let conn = self.connection("query")?;
        let (where_clause, values) = filter.to_sql();
        let sql = format!(
            "SELECT {} FROM features{} ORDER BY map_hash, timestamp, mod_mask, idx",
            schema::expected_columns().join(", "),
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureTable::from_records(records))
    }

    /// Every stored play with its record count, in key order.
    pub fn plays(&self) -> Result<Vec<StoredPlay>, StoreError> {
        let conn = self.connection("list plays")?;
        let mut stmt = conn.prepare(
            "SELECT map_hash, timestamp, mod_mask, COUNT(*) FROM features
             GROUP BY map_hash, timestamp, mod_mask
             ORDER BY map_hash, timestamp, mod_mask",
        )?;
        let plays = stmt
            .query_map([], |row| {
                let count: i64 = row.get(3)?;
                Ok(StoredPlay {
                    key: PlayKey::new(row.get::<_, String>(0)?, row.get(1)?, row.get(2)?),
                    records: count as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plays)
    }

    /// Number of stored feature records.
    pub fn entry_count(&self) -> Result<usize, StoreError> {
        let conn = self.connection("count entries")?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM features", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let conn = self.connection("check emptiness")?;
        let any: bool = conn.query_row("SELECT EXISTS(SELECT 1 FROM features)", [], |row| {
            row.get(0)
        })?;
        Ok(!any)
    }

    /// Feature schema version recorded in the store.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.connection("read schema version")?;
        schema::read_feature_schema_version(conn)
    }

    /// Rebuild the key indexes and compact the file.
    pub fn reindex(&mut self) -> Result<(), StoreError> {
        let conn = self.connection_mut("reindex")?;
        conn.execute_batch("REINDEX features; ANALYZE; VACUUM;")?;
        info!("Feature store reindexed");
        Ok(())
    }

    /// Delete the store file and start over with an empty store.
    ///
    /// Legal from every state except `Opening`; this is the recovery path
    /// for corrupted and stale stores.
    pub fn drop_and_recreate(&mut self) -> Result<(), StoreError> {
        if self.state == StoreState::Opening {
            return Err(self.invalid("drop and recreate"));
        }

        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!("Failed to close feature store cleanly: {err}");
            }
        }
        self.state = StoreState::Closed;

        for path in store_files(&self.path) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(StoreError::Io(err)),
            }
        }

        info!("Recreating feature store at {}", self.path.display());
        self.open()
    }

    fn invalid(&self, operation: &'static str) -> StoreError {
        StoreError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn require(&self, state: StoreState, operation: &'static str) -> Result<(), StoreError> {
        if self.state == state {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn connection(&self, operation: &'static str) -> Result<&Connection, StoreError> {
        self.require(StoreState::Open, operation)?;
        self.conn.as_ref().ok_or_else(|| self.invalid(operation))
    }

    fn connection_mut(&mut self, operation: &'static str) -> Result<&mut Connection, StoreError> {
        self.require(StoreState::Open, operation)?;
        let state = self.state;
        self.conn.as_mut().ok_or(StoreError::InvalidState { operation, state })
    }
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(path)?;
    schema::prepare(&mut conn, path)?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Failed to enable WAL mode: {err}");
    }
    Ok(conn)
}

/// The database file and its WAL companions.
fn store_files(path: &Path) -> Vec<PathBuf> {
    let mut files = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        files.push(PathBuf::from(name));
    }
    files
}

fn insert_sql() -> String {
    let columns = schema::expected_columns();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT OR REPLACE INTO features ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn row_to_record(row: &Row) -> Result<FeatureRecord, rusqlite::Error> {
    let key = PlayKey::new(
        row.get::<_, String>("map_hash")?,
        row.get("timestamp")?,
        row.get("mod_mask")?,
    );
    let mut record = FeatureRecord::new(&key, row.get("idx")?);
    for column in FeatureColumn::ALL {
        record.set(column, row.get(column.sql_name())?);
    }
    Ok(record)
}
