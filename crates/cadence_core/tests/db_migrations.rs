use cadence_core::db::migrations::latest_version;
use cadence_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "lifecycle_entities");
    assert_table_exists(&conn, "lifecycle_audit");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadence.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "lifecycle_entities");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn storage_refuses_second_active_entity_per_family() {
    let conn = open_db_in_memory().unwrap();
    insert_raw(&conn, "a", "data_batch", "active", "2025-01-01", "2025-01-31");
    insert_raw(&conn, "t", "governance_term", "active", "2025-01-01", "2025-12-31");

    let duplicate = try_insert_raw(&conn, "b", "data_batch", "active", "2025-02-01", "2025-02-28");
    assert!(duplicate.is_err(), "second active batch must be refused");

    let pending = try_insert_raw(&conn, "c", "data_batch", "draft", "2025-02-01", "2025-02-28");
    assert!(pending.is_ok(), "any number of drafts is fine");
}

#[test]
fn storage_rejects_status_outside_family_vocabulary() {
    let conn = open_db_in_memory().unwrap();
    let result = try_insert_raw(&conn, "a", "data_batch", "upcoming", "2025-01-01", "2025-01-31");
    assert!(result.is_err());
}

fn insert_raw(conn: &Connection, id: &str, family: &str, status: &str, start: &str, end: &str) {
    try_insert_raw(conn, id, family, status, start, end).unwrap();
}

fn try_insert_raw(
    conn: &Connection,
    id: &str,
    family: &str,
    status: &str,
    start: &str,
    end: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO lifecycle_entities (
            id, family, display_name, start_date, end_date, status, created_at, updated_at
        ) VALUES (?1, ?2, 'raw', ?3, ?4, ?5, 0, 0);",
        rusqlite::params![id, family, start, end, status],
    )
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
