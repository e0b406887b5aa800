use chrono::{NaiveDate, NaiveTime};
use eduvault_core::db::open_db_in_memory;
use eduvault_core::{
    JsonTaskStore, Priority, RepoError, SqliteTaskRepository, Task, TaskListQuery, TaskRepository,
};
use rusqlite::Connection;
use std::fs;

fn task(title: &str, day: u32, hour: u32, minute: u32) -> Task {
    Task::new(
        title,
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        25,
        Priority::Medium,
    )
}

#[test]
fn insert_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();

    let mut created = task("Read chapter 3", 1, 9, 0);
    created.priority = Priority::High;
    repo.insert_task(&created).unwrap();

    let loaded = repo.get_task(created.id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert!(!loaded.completed);
}

#[test]
fn insert_twice_is_duplicate() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();
    let created = task("Essay", 1, 10, 0);

    repo.insert_task(&created).unwrap();
    let err = repo.insert_task(&created).unwrap_err();
    assert!(matches!(err, RepoError::Duplicate(id) if id == created.id));
}

#[test]
fn update_and_delete_missing_task_return_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();
    let ghost = task("Ghost", 1, 10, 0);

    assert!(matches!(
        repo.update_task(&ghost).unwrap_err(),
        RepoError::NotFound(_)
    ));
    assert!(matches!(
        repo.delete_task(ghost.id).unwrap_err(),
        RepoError::NotFound(_)
    ));
}

#[test]
fn update_persists_completion_flag() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();
    let mut created = task("Flashcards", 1, 11, 30);
    repo.insert_task(&created).unwrap();

    created.completed = true;
    created.title = "Flashcards (set B)".to_string();
    repo.update_task(&created).unwrap();

    let loaded = repo.get_task(created.id).unwrap().unwrap();
    assert!(loaded.completed);
    assert_eq!(loaded.title, "Flashcards (set B)");
}

#[test]
fn save_task_inserts_then_replaces() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();
    let mut created = task("Lab report", 2, 14, 0);

    repo.save_task(&created).unwrap();
    created.duration_minutes = 50;
    repo.save_task(&created).unwrap();

    let all = repo.list_tasks(&TaskListQuery::default()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].duration_minutes, 50);
}

#[test]
fn rows_are_scoped_to_their_user() {
    let conn = open_db_in_memory().unwrap();
    let alice = SqliteTaskRepository::try_new(&conn, "alice").unwrap();
    let bob = SqliteTaskRepository::try_new(&conn, "bob").unwrap();

    let mine = task("Alice's task", 1, 9, 0);
    alice.insert_task(&mine).unwrap();

    assert!(bob.get_task(mine.id).unwrap().is_none());
    assert!(bob.list_tasks(&TaskListQuery::default()).unwrap().is_empty());
    assert!(matches!(
        bob.delete_task(mine.id).unwrap_err(),
        RepoError::NotFound(_)
    ));
    assert!(matches!(
        bob.save_task(&mine).unwrap_err(),
        RepoError::InvalidData(_)
    ));
    assert_eq!(alice.get_task(mine.id).unwrap().unwrap().title, "Alice's task");
}

#[test]
fn list_is_ordered_and_filtered() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();

    let late = task("Late", 1, 18, 0);
    let early = task("Early", 1, 8, 15);
    let mut tomorrow = task("Tomorrow", 2, 7, 0);
    tomorrow.completed = true;
    for item in [&late, &early, &tomorrow] {
        repo.insert_task(item).unwrap();
    }

    let titles: Vec<String> = repo
        .list_tasks(&TaskListQuery::default())
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["Early", "Late", "Tomorrow"]);

    let on_first = repo
        .list_tasks(&TaskListQuery {
            date: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..TaskListQuery::default()
        })
        .unwrap();
    assert_eq!(on_first.len(), 2);

    let done = repo
        .list_tasks(&TaskListQuery {
            completed: Some(true),
            ..TaskListQuery::default()
        })
        .unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, tomorrow.id);

    let limited = repo
        .list_tasks(&TaskListQuery {
            limit: Some(1),
            ..TaskListQuery::default()
        })
        .unwrap();
    assert_eq!(limited[0].id, early.id);
}

#[test]
fn invalid_tasks_are_rejected_before_write() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();
    let mut invalid = task("  ", 1, 9, 0);
    invalid.title = "   ".to_string();

    assert!(matches!(
        repo.insert_task(&invalid).unwrap_err(),
        RepoError::Validation(_)
    ));
}

#[test]
fn try_new_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteTaskRepository::try_new(&conn, "student-1").err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn try_new_rejects_blank_user() {
    let conn = open_db_in_memory().unwrap();
    let err = SqliteTaskRepository::try_new(&conn, "  ").err().unwrap();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn try_new_rejects_missing_table_and_column() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE tasks;").unwrap();
    let err = SqliteTaskRepository::try_new(&conn, "student-1").err().unwrap();
    assert!(matches!(err, RepoError::MissingRequiredTable("tasks")));

    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "DROP TABLE tasks;
         CREATE TABLE tasks (id TEXT PRIMARY KEY, user_id TEXT, title TEXT);",
    )
    .unwrap();
    let err = SqliteTaskRepository::try_new(&conn, "student-1").err().unwrap();
    assert!(matches!(
        err,
        RepoError::MissingRequiredColumn {
            table: "tasks",
            column: "date"
        }
    ));
}

#[test]
fn corrupted_row_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();
    conn.execute(
        "INSERT INTO tasks (id, user_id, title, date, time, duration)
         VALUES (?1, 'student-1', 'Broken', '2024-06-01', '9am', 25);",
        [uuid::Uuid::new_v4().to_string()],
    )
    .unwrap();

    assert!(repo.list_tasks(&TaskListQuery::default()).is_err());
}

#[test]
fn json_store_missing_file_reads_empty_and_persists_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("tasks.json");
    let store = JsonTaskStore::new(&path);

    assert!(store.list_tasks(&TaskListQuery::default()).unwrap().is_empty());

    let first = task("Second", 1, 12, 0);
    let second = task("First", 1, 8, 0);
    store.insert_task(&first).unwrap();
    store.insert_task(&second).unwrap();
    assert!(matches!(
        store.insert_task(&first).unwrap_err(),
        RepoError::Duplicate(_)
    ));

    let reopened = JsonTaskStore::new(&path);
    let titles: Vec<String> = reopened
        .list_tasks(&TaskListQuery::default())
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["First", "Second"]);

    reopened.delete_task(first.id).unwrap();
    assert!(matches!(
        reopened.delete_task(first.id).unwrap_err(),
        RepoError::NotFound(_)
    ));
    assert_eq!(reopened.list_tasks(&TaskListQuery::default()).unwrap().len(), 1);
}

#[test]
fn json_store_document_uses_hosted_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    let store = JsonTaskStore::new(&path);
    store.insert_task(&task("Shape", 1, 9, 5)).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
    let stored = &raw["tasks"][0];
    assert_eq!(stored["date"], "2024-06-01");
    assert_eq!(stored["time"], "09:05");
    assert_eq!(stored["duration"], 25);
    assert_eq!(stored["completed"], false);
}

#[test]
fn json_store_rejects_malformed_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    fs::write(&path, r#"{"version": 7, "tasks": []}"#).unwrap();
    assert!(matches!(
        JsonTaskStore::new(&path)
            .list_tasks(&TaskListQuery::default())
            .unwrap_err(),
        RepoError::InvalidData(_)
    ));

    fs::write(
        &path,
        r#"{"version": 1, "tasks": [{"id": "6f1c1c36-2f43-4d5c-9a55-1e2a3b4c5d6e",
            "title": "Bad", "date": "2024-06-01", "time": "09:00",
            "duration": 0, "completed": false}]}"#,
    )
    .unwrap();
    assert!(matches!(
        JsonTaskStore::new(&path)
            .list_tasks(&TaskListQuery::default())
            .unwrap_err(),
        RepoError::InvalidData(_)
    ));

    fs::write(&path, "not json").unwrap();
    assert!(matches!(
        JsonTaskStore::new(&path)
            .list_tasks(&TaskListQuery::default())
            .unwrap_err(),
        RepoError::Json(_)
    ));
}

#[test]
fn json_store_io_failures_surface_as_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonTaskStore::new(dir.path());

    let err = store.list_tasks(&TaskListQuery::default()).unwrap_err();
    assert!(matches!(err, RepoError::Io(_)));
    assert!(std::error::Error::source(&err).is_some());
}
