use eduvault_core::db::migrations::latest_version;
use eduvault_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "tasks");
    assert_index_exists(&conn, "idx_tasks_user_schedule");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eduvault.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "tasks");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

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
fn failing_migration_names_the_step_and_keeps_old_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE tasks (id TEXT PRIMARY KEY);")
        .unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::Migration { version, name, .. } => {
            assert_eq!(version, 1);
            assert_eq!(name, "tasks");
        }
        other => panic!("unexpected error: {other}"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
}

#[test]
fn table_constraints_reject_bad_rows() {
    let conn = open_db_in_memory().unwrap();

    let zero_duration = conn.execute(
        "INSERT INTO tasks (id, user_id, title, date, time, duration)
         VALUES ('a', 'u', 't', '2024-06-01', '09:00', 0);",
        [],
    );
    assert!(zero_duration.is_err());

    let bad_priority = conn.execute(
        "INSERT INTO tasks (id, user_id, title, date, time, duration, priority)
         VALUES ('b', 'u', 't', '2024-06-01', '09:00', 25, 'urgent');",
        [],
    );
    assert!(bad_priority.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_eq!(
        sqlite_master_count(conn, "table", table_name),
        1,
        "table {table_name} does not exist"
    );
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_eq!(
        sqlite_master_count(conn, "index", index_name),
        1,
        "index {index_name} does not exist"
    );
}

fn sqlite_master_count(conn: &Connection, kind: &str, name: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2;",
        [kind, name],
        |row| row.get(0),
    )
    .unwrap()
}
