use chrono::{Duration, NaiveDate, NaiveDateTime};
use eduvault_core::db::open_db_in_memory;
use eduvault_core::service::task_service::{
    CHANGES_REVERTED_TITLE, GOAL_ACHIEVED_TITLE, LOAD_FAILED_TITLE, SYNC_FAILED_TITLE,
};
use eduvault_core::{
    JsonTaskStore, NotificationCenter, NotificationKind, Priority, RepoError, RepoResult,
    RetryPolicy, SqliteTaskRepository, Task, TaskDraft, TaskId, TaskListQuery, TaskRepository,
    TaskService, TaskServiceError, TaskValidationError,
};
use std::cell::Cell;
use std::io;
use tempfile::TempDir;

/// JSON store that fails every call while `offline` is set.
struct FlakyStore {
    inner: JsonTaskStore,
    offline: Cell<bool>,
    _dir: TempDir,
}

impl FlakyStore {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            inner: JsonTaskStore::new(dir.path().join("tasks.json")),
            offline: Cell::new(false),
            _dir: dir,
        }
    }

    fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    fn check(&self) -> RepoResult<()> {
        if self.offline.get() {
            return Err(RepoError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "backend offline",
            )));
        }
        Ok(())
    }
}

impl TaskRepository for FlakyStore {
    fn insert_task(&self, task: &Task) -> RepoResult<()> {
        self.check()?;
        self.inner.insert_task(task)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        self.check()?;
        self.inner.update_task(task)
    }

    fn save_task(&self, task: &Task) -> RepoResult<()> {
        self.check()?;
        self.inner.save_task(task)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        self.check()?;
        self.inner.delete_task(id)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        self.check()?;
        self.inner.get_task(id)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        self.check()?;
        self.inner.list_tasks(query)
    }
}

fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
}

fn draft(title: &str, time: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        date: "2024-06-01".to_string(),
        time: time.to_string(),
        duration_minutes: 25,
        priority: Priority::Medium,
    }
}

fn retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_secs: 2,
        max_delay_secs: 60,
    }
}

fn service() -> TaskService<FlakyStore, NotificationCenter> {
    TaskService::new(FlakyStore::new(), NotificationCenter::new(20), retry())
}

fn titles(service: &TaskService<FlakyStore, NotificationCenter>) -> Vec<String> {
    service
        .notifier()
        .entries()
        .map(|notification| notification.title.clone())
        .collect()
}

#[test]
fn create_adds_incomplete_task_to_board_and_store() {
    let mut service = service();
    let task = service
        .create_task(draft("  Read chapter 3  ", "09:00"), at(8, 0, 0))
        .unwrap();

    assert_eq!(task.title, "Read chapter 3");
    assert!(!task.completed);
    assert_eq!(service.board().len(), 1);
    assert_eq!(
        service.repo().get_task(task.id).unwrap().unwrap(),
        task
    );
    assert!(service.notifier().is_empty());
}

#[test]
fn create_rejects_invalid_draft_without_side_effects() {
    let mut service = service();
    let mut bad = draft("Essay", "25:00");
    let err = service.create_task(bad.clone(), at(8, 0, 0)).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Validation(TaskValidationError::InvalidTime(_))
    ));

    bad.time = "09:00".to_string();
    bad.duration_minutes = 0;
    let err = service.create_task(bad, at(8, 0, 0)).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Validation(TaskValidationError::NonPositiveDuration)
    ));

    assert!(service.board().is_empty());
    assert!(service
        .repo()
        .list_tasks(&TaskListQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn toggle_notifies_only_when_becoming_complete() {
    let mut service = service();
    let task = service.create_task(draft("Quiz", "10:00"), at(8, 0, 0)).unwrap();

    let done = service.toggle_complete(task.id, at(8, 1, 0)).unwrap();
    assert!(done.completed);
    let undone = service.toggle_complete(task.id, at(8, 2, 0)).unwrap();
    assert!(!undone.completed);

    assert_eq!(titles(&service), vec![GOAL_ACHIEVED_TITLE]);
    assert_eq!(
        service.notifier().latest().unwrap().kind,
        NotificationKind::Success
    );
    assert!(!service.repo().get_task(task.id).unwrap().unwrap().completed);
}

#[test]
fn complete_task_is_idempotent() {
    let mut service = service();
    let task = service.create_task(draft("Quiz", "10:00"), at(8, 0, 0)).unwrap();

    assert!(service.complete_task(task.id, at(9, 0, 0)).unwrap());
    assert!(!service.complete_task(task.id, at(9, 0, 1)).unwrap());
    assert_eq!(titles(&service), vec![GOAL_ACHIEVED_TITLE]);
}

#[test]
fn update_keeps_completion_and_id() {
    let mut service = service();
    let task = service.create_task(draft("Notes", "10:00"), at(8, 0, 0)).unwrap();
    service.toggle_complete(task.id, at(8, 1, 0)).unwrap();

    let mut edit = draft("Notes v2", "11:30");
    edit.priority = Priority::High;
    let updated = service.update_task(task.id, edit, at(8, 2, 0)).unwrap();

    assert_eq!(updated.id, task.id);
    assert!(updated.completed);
    assert_eq!(updated.time_label(), "11:30");
    assert_eq!(service.repo().get_task(task.id).unwrap().unwrap(), updated);
}

#[test]
fn unknown_ids_are_not_found() {
    let mut service = service();
    let missing = uuid::Uuid::new_v4();

    assert!(matches!(
        service.toggle_complete(missing, at(8, 0, 0)).unwrap_err(),
        TaskServiceError::NotFound(id) if id == missing
    ));
    assert!(matches!(
        service.delete_task(missing, at(8, 0, 0)).unwrap_err(),
        TaskServiceError::NotFound(_)
    ));
}

#[test]
fn delete_removes_from_board_and_store() {
    let mut service = service();
    let keep = service.create_task(draft("Keep", "09:00"), at(8, 0, 0)).unwrap();
    let dropped = service.create_task(draft("Drop", "10:00"), at(8, 0, 0)).unwrap();

    service.delete_task(dropped.id, at(8, 1, 0)).unwrap();

    assert!(service.board().get(dropped.id).is_none());
    assert!(service.board().get(keep.id).is_some());
    assert!(service.repo().get_task(dropped.id).unwrap().is_none());
}

#[test]
fn failed_create_stays_on_board_and_commits_on_retry() {
    let mut service = service();
    service.repo().set_offline(true);

    let task = service.create_task(draft("Offline", "09:00"), at(8, 0, 0)).unwrap();
    assert!(service.board().get(task.id).is_some());
    assert_eq!(service.pending_changes().len(), 1);
    assert_eq!(titles(&service), vec![SYNC_FAILED_TITLE]);

    service.repo().set_offline(false);
    let early = service.flush_pending(at(8, 0, 1));
    assert!(early.committed.is_empty());
    assert_eq!(service.pending_changes().len(), 1);

    let report = service.flush_pending(at(8, 0, 2));
    assert_eq!(report.committed, vec![task.id]);
    assert!(service.pending_changes().is_empty());
    assert_eq!(service.repo().get_task(task.id).unwrap().unwrap(), task);
}

#[test]
fn exhausted_create_is_rolled_back_with_alert() {
    let mut service = service();
    service.repo().set_offline(true);
    let task = service.create_task(draft("Doomed", "09:00"), at(8, 0, 0)).unwrap();

    // Attempts: initial write, retry at +2s, retry at +6s.
    service.flush_pending(at(8, 0, 2));
    assert_eq!(service.pending_changes()[0].attempts, 2);
    assert!(service.board().get(task.id).is_some());

    let report = service.flush_pending(at(8, 0, 6));
    assert_eq!(report.exhausted.len(), 1);
    assert!(service.pending_changes().is_empty());
    assert!(service.board().get(task.id).is_none());
    assert_eq!(
        titles(&service),
        vec![SYNC_FAILED_TITLE, CHANGES_REVERTED_TITLE]
    );
}

#[test]
fn exhausted_toggle_restores_previous_state() {
    let mut service = service();
    let task = service.create_task(draft("Revert me", "09:00"), at(8, 0, 0)).unwrap();

    service.repo().set_offline(true);
    service.toggle_complete(task.id, at(8, 1, 0)).unwrap();
    assert!(service.board().get(task.id).unwrap().completed);

    service.flush_pending(at(8, 1, 2));
    service.flush_pending(at(8, 1, 6));

    assert!(!service.board().get(task.id).unwrap().completed);
    assert_eq!(service.notifier().latest().unwrap().title, CHANGES_REVERTED_TITLE);
}

#[test]
fn exhausted_delete_restores_task() {
    let mut service = service();
    let task = service.create_task(draft("Sticky", "09:00"), at(8, 0, 0)).unwrap();

    service.repo().set_offline(true);
    service.delete_task(task.id, at(8, 1, 0)).unwrap();
    assert!(service.board().get(task.id).is_none());

    service.flush_pending(at(8, 1, 2));
    service.flush_pending(at(8, 1, 6));
    assert_eq!(service.board().get(task.id), Some(&task));
}

#[test]
fn edits_while_pending_coalesce_into_one_entry() {
    let mut service = service();
    service.repo().set_offline(true);
    let task = service.create_task(draft("Draft", "09:00"), at(8, 0, 0)).unwrap();
    service
        .update_task(task.id, draft("Draft v2", "09:30"), at(8, 0, 1))
        .unwrap();
    assert_eq!(service.pending_changes().len(), 1);

    service.repo().set_offline(false);
    service.flush_pending(at(8, 0, 5));
    let stored = service.repo().get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.title, "Draft v2");
}

#[test]
fn reload_keeps_pending_changes_visible() {
    let mut service = service();
    let saved = service.create_task(draft("Saved", "09:00"), at(8, 0, 0)).unwrap();

    service.repo().set_offline(true);
    let pending = service.create_task(draft("Pending", "10:00"), at(8, 1, 0)).unwrap();

    service.repo().set_offline(false);
    service.reload(at(8, 2, 0)).unwrap();
    assert!(service.board().get(saved.id).is_some());
    assert!(service.board().get(pending.id).is_some());
}

#[test]
fn reload_failure_raises_alert_and_keeps_board() {
    let mut service = service();
    let kept = service.create_task(draft("Kept", "09:00"), at(8, 0, 0)).unwrap();

    service.repo().set_offline(true);
    let err = service.reload(at(8, 5, 0)).unwrap_err();
    assert!(matches!(err, TaskServiceError::Repo(RepoError::Io(_))));

    let alert = service.notifier().latest().unwrap();
    assert_eq!(alert.kind, NotificationKind::Alert);
    assert_eq!(alert.title, LOAD_FAILED_TITLE);
    assert_eq!(service.board().tasks(), &[kept]);
}

#[test]
fn load_reads_existing_sqlite_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn, "student-1").unwrap();
    let existing = draft("Existing", "09:00").into_task().unwrap();
    repo.insert_task(&existing).unwrap();

    let mut service =
        TaskService::load(
            repo,
            NotificationCenter::new(10),
            RetryPolicy::default(),
            at(8, 0, 0),
        )
        .unwrap();
    assert_eq!(service.board().tasks(), &[existing.clone()]);

    let later = at(9, 0, 0) + Duration::minutes(1);
    service.toggle_complete(existing.id, later).unwrap();
    assert!(service.repo().get_task(existing.id).unwrap().unwrap().completed);
}
