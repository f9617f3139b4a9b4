//! Store layout: migrations and structural checks run at open.
//!
//! Two versions are tracked. `PRAGMA user_version` is the table layout and
//! is advanced by migrations. The `feature_schema_version` row in
//! `store_meta` names the extraction algorithm the stored values came from;
//! a store written by a different algorithm is stale and must be rebuilt.

use crate::core::FeatureColumn;
use crate::store::StoreError;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Current table layout, stored in `PRAGMA user_version`.
pub const LAYOUT_VERSION: i32 = 1;

/// Version of the feature definitions. Bump whenever an extractor changes
/// the values it produces.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

pub(crate) const FEATURES_TABLE: &str = "features";
const META_TABLE: &str = "store_meta";
const FEATURE_SCHEMA_KEY: &str = "feature_schema_version";

/// Key columns, in primary key order.
pub(crate) const KEY_COLUMNS: [&str; 4] = ["map_hash", "timestamp", "mod_mask", "idx"];

/// Every column of the `features` table, in declaration order.
pub(crate) fn expected_columns() -> Vec<&'static str> {
    KEY_COLUMNS
        .iter()
        .copied()
        .chain(FeatureColumn::ALL.iter().map(|c| c.sql_name()))
        .collect()
}

/// Bring a freshly opened connection to a usable state, or explain why it
/// can't be used.
pub(crate) fn prepare(conn: &mut Connection, path: &Path) -> Result<(), StoreError> {
    let corrupt = |reason: String| StoreError::Corruption {
        path: path.to_path_buf(),
        reason,
    };

    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|err| classify(err, path))?;
    let tables = table_names(conn).map_err(|err| classify(err, path))?;

    if version > LAYOUT_VERSION {
        return Err(corrupt(format!(
            "layout version {version} is newer than supported version {LAYOUT_VERSION}"
        )));
    }

    if version == 0 && tables.is_empty() {
        info!("Initializing new feature store at {}", path.display());
        run_migrations(conn)?;
        write_feature_schema_version(conn)?;
        return Ok(());
    }

    if !tables.iter().any(|t| t == FEATURES_TABLE) {
        return Err(corrupt(format!("table `{FEATURES_TABLE}` is missing")));
    }

    let columns = table_columns(conn).map_err(|err| classify(err, path))?;
    let key_arity = columns.iter().filter(|(_, pk)| *pk > 0).count();
    if key_arity != KEY_COLUMNS.len() {
        return Err(corrupt(format!(
            "primary key has {key_arity} columns, expected {}",
            KEY_COLUMNS.len()
        )));
    }

    if version < LAYOUT_VERSION {
        run_migrations(conn)?;
    }

    let found = read_feature_schema_version(conn)?;
    let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
    if found != Some(FEATURE_SCHEMA_VERSION) || names != expected_columns() {
        return Err(StoreError::StaleSchema {
            found,
            expected: FEATURE_SCHEMA_VERSION,
        });
    }

    debug!(
        "Opened feature store at {} (layout v{}, features v{})",
        path.display(),
        LAYOUT_VERSION,
        FEATURE_SCHEMA_VERSION
    );
    Ok(())
}

/// Failures that mean "this file is not a usable database" become
/// corruption; anything else (locking, permissions) stays a SQLite error.
fn classify(err: rusqlite::Error, path: &Path) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if matches!(
                failure.code,
                ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt
            ) =>
        {
            StoreError::Corruption {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
        other => StoreError::Sqlite(other),
    }
}

fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// `(name, primary key position)` of every `features` column.
fn table_columns(conn: &Connection) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([FEATURES_TABLE], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;
    Ok(columns)
}

/// Stored feature schema version; `None` when absent or unreadable.
pub(crate) fn read_feature_schema_version(conn: &Connection) -> Result<Option<u32>, StoreError> {
    let has_meta: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [META_TABLE],
        |row| row.get(0),
    )?;
    if !has_meta {
        return Ok(None);
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            [FEATURE_SCHEMA_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.trim().parse().ok()))
}

fn write_feature_schema_version(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
        params![FEATURE_SCHEMA_KEY, FEATURE_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    let tx = conn.transaction()?;
    while version < LAYOUT_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        debug!("Applied store migration v{next_version}");
        version = next_version;
    }
    tx.pragma_update(None, "user_version", LAYOUT_VERSION)?;
    tx.commit()?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), StoreError> {
    match version {
        1 => tx.execute_batch(include_str!("schemas/schema_v1.sql"))?,
        _ => return Err(StoreError::UnknownMigration { version }),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_columns_order() {
        let columns = expected_columns();
        assert_eq!(&columns[..4], &KEY_COLUMNS);
        assert_eq!(columns[4], "press_interval");
        assert_eq!(columns.len(), 4 + FeatureColumn::ALL.len());
    }

    #[test]
    fn test_prepare_fresh_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        prepare(&mut conn, Path::new(":memory:")).unwrap();

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, LAYOUT_VERSION);
        assert_eq!(
            read_feature_schema_version(&conn).unwrap(),
            Some(FEATURE_SCHEMA_VERSION)
        );

        let names: Vec<String> = table_columns(&conn)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, expected_columns());

        // Preparing again is a no-op.
        prepare(&mut conn, Path::new(":memory:")).unwrap();
    }

    #[test]
    fn test_extra_feature_column_is_stale() {
        let mut conn = Connection::open_in_memory().unwrap();
        prepare(&mut conn, Path::new(":memory:")).unwrap();
        conn.execute_batch("ALTER TABLE features ADD COLUMN jerk REAL")
            .unwrap();

        let err = prepare(&mut conn, Path::new(":memory:")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::StaleSchema {
                found: Some(FEATURE_SCHEMA_VERSION),
                ..
            }
        ));
    }
}
