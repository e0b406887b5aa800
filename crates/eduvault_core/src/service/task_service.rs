//! Task CRUD use-case service.
//!
//! # Responsibility
//! - Own the in-memory task board and keep it in step with the task store.
//! - Validate input before any persistence attempt.
//! - Emit user-visible notifications for completions and store failures.
//!
//! # Invariants
//! - Local state is applied first; store failures never undo it immediately.
//!   Failed writes go to the outbox and are rolled back only once retries are
//!   exhausted.
//! - A success notification is emitted only on a false→true completion.
//! - The board is never mutated outside this service.

use crate::config::RetryPolicy;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::task::{Task, TaskDraft, TaskId, TaskValidationError};
use crate::notify::Notifier;
use crate::repo::task_repo::{RepoError, TaskListQuery, TaskRepository};
use crate::service::board::TaskBoard;
use crate::service::outbox::{FlushReport, Outbox, PendingChange, Rollback, TaskChange};
use chrono::NaiveDateTime;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const GOAL_ACHIEVED_TITLE: &str = "Goal Achieved!";
pub const SYNC_FAILED_TITLE: &str = "Sync Failed";
pub const CHANGES_REVERTED_TITLE: &str = "Changes Reverted";
pub const LOAD_FAILED_TITLE: &str = "Load Failed";

/// Error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Input rejected before persistence.
    Validation(TaskValidationError),
    /// No task with this id on the board.
    NotFound(TaskId),
    /// Store failure on a read path (writes never surface here).
    Repo(RepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Task CRUD facade over a store and a notification sink.
pub struct TaskService<R: TaskRepository, N: Notifier> {
    repo: R,
    notifier: N,
    board: TaskBoard,
    outbox: Outbox,
}

impl<R: TaskRepository, N: Notifier> TaskService<R, N> {
    /// Creates a service with an empty board.
    pub fn new(repo: R, notifier: N, retry: RetryPolicy) -> Self {
        Self {
            repo,
            notifier,
            board: TaskBoard::default(),
            outbox: Outbox::new(retry),
        }
    }

    /// Creates a service and fills the board from the store.
    pub fn load(
        repo: R,
        notifier: N,
        retry: RetryPolicy,
        now: NaiveDateTime,
    ) -> Result<Self, TaskServiceError> {
        let mut service = Self::new(repo, notifier, retry);
        service.reload(now)?;
        Ok(service)
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Writes the store has not accepted yet.
    pub fn pending_changes(&self) -> &[PendingChange] {
        self.outbox.entries()
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Replaces the board with the store's contents.
    ///
    /// Pending writes are re-applied on top so a refresh does not hide
    /// changes the user already made. A read failure raises an alert and
    /// leaves the board untouched.
    pub fn reload(&mut self, now: NaiveDateTime) -> Result<(), TaskServiceError> {
        let mut tasks = match self.repo.list_tasks(&TaskListQuery::default()) {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(
                    "event=task_reload module=service status=error error_code=store_read_failed error={err}"
                );
                self.notifier.notify(Notification::new(
                    NotificationKind::Alert,
                    LOAD_FAILED_TITLE,
                    "Could not load your tasks. Showing the last known list.",
                    now,
                ));
                return Err(err.into());
            }
        };
        for entry in self.outbox.entries() {
            match &entry.change {
                TaskChange::Save(task) => {
                    match tasks.iter_mut().find(|existing| existing.id == task.id) {
                        Some(slot) => *slot = task.clone(),
                        None => tasks.push(task.clone()),
                    }
                }
                TaskChange::Delete(id) => tasks.retain(|task| task.id != *id),
            }
        }
        info!(
            "event=task_reload module=service status=ok count={} pending={}",
            tasks.len(),
            self.outbox.entries().len()
        );
        self.board.replace_all(tasks);
        Ok(())
    }

    /// Validates the draft and adds a new incomplete task.
    ///
    /// # Errors
    /// - `Validation` when any field is invalid; nothing is persisted.
    pub fn create_task(
        &mut self,
        draft: TaskDraft,
        now: NaiveDateTime,
    ) -> Result<Task, TaskServiceError> {
        let task = draft.into_task()?;
        self.board.upsert(task.clone());

        match self.repo.insert_task(&task) {
            Ok(()) => info!(
                "event=task_create module=service status=ok task_id={} date={} time={}",
                task.id,
                task.date_label(),
                task.time_label()
            ),
            Err(err) => self.persistence_failed(
                TaskChange::Save(task.clone()),
                Rollback::Remove(task.id),
                &task,
                err,
                now,
            ),
        }

        Ok(task)
    }

    /// Replaces a task's editable fields; `completed` is kept.
    pub fn update_task(
        &mut self,
        id: TaskId,
        draft: TaskDraft,
        now: NaiveDateTime,
    ) -> Result<Task, TaskServiceError> {
        let previous = self.require(id)?.clone();
        let updated = draft.apply_to(&previous)?;
        self.commit_save(previous, updated.clone(), now);
        Ok(updated)
    }

    /// Flips the completion flag.
    ///
    /// Emits "Goal Achieved!" only when the task becomes complete.
    pub fn toggle_complete(
        &mut self,
        id: TaskId,
        now: NaiveDateTime,
    ) -> Result<Task, TaskServiceError> {
        let previous = self.require(id)?.clone();
        let mut updated = previous.clone();
        updated.completed = !previous.completed;
        self.commit_save(previous, updated.clone(), now);
        if updated.completed {
            self.notify_goal_achieved(&updated, now);
        }
        Ok(updated)
    }

    /// Marks a task complete if it is not already.
    ///
    /// Returns `true` when the flag flipped. Used by the session clock, so a
    /// task is completed at most once however often it is called.
    pub fn complete_task(&mut self, id: TaskId, now: NaiveDateTime) -> Result<bool, TaskServiceError> {
        let previous = self.require(id)?.clone();
        if previous.completed {
            return Ok(false);
        }
        let mut updated = previous.clone();
        updated.completed = true;
        self.commit_save(previous, updated.clone(), now);
        self.notify_goal_achieved(&updated, now);
        Ok(true)
    }

    /// Removes a task. No other entity references tasks, so nothing cascades.
    pub fn delete_task(&mut self, id: TaskId, now: NaiveDateTime) -> Result<Task, TaskServiceError> {
        let removed = self.board.remove(id).ok_or(TaskServiceError::NotFound(id))?;

        match self.repo.delete_task(id) {
            Ok(()) | Err(RepoError::NotFound(_)) => {
                self.outbox.discard(id);
                info!("event=task_delete module=service status=ok task_id={id}");
            }
            Err(err) => self.persistence_failed(
                TaskChange::Delete(id),
                Rollback::Restore(removed.clone()),
                &removed,
                err,
                now,
            ),
        }

        Ok(removed)
    }

    /// Replays pending writes whose backoff elapsed.
    ///
    /// Exhausted writes are rolled back on the board and reported with an
    /// alert.
    pub fn flush_pending(&mut self, now: NaiveDateTime) -> FlushReport {
        if self.outbox.is_empty() {
            return FlushReport::default();
        }

        let report = self.outbox.flush(&self.repo, now);
        for entry in &report.exhausted {
            let title = match &entry.rollback {
                Rollback::Remove(id) => self.board.remove(*id).map(|task| task.title),
                Rollback::Restore(task) => {
                    self.board.upsert(task.clone());
                    Some(task.title.clone())
                }
            };
            warn!(
                "event=task_rollback module=service status=ok task_id={} attempts={}",
                entry.change.task_id(),
                entry.attempts
            );
            let label = title.unwrap_or_else(|| "a task".to_string());
            self.notifier.notify(Notification::new(
                NotificationKind::Alert,
                CHANGES_REVERTED_TITLE,
                format!("Could not sync changes to \"{label}\"; reverted to the saved version."),
                now,
            ));
        }
        report
    }

    fn require(&self, id: TaskId) -> Result<&Task, TaskServiceError> {
        self.board.get(id).ok_or(TaskServiceError::NotFound(id))
    }

    fn commit_save(&mut self, previous: Task, updated: Task, now: NaiveDateTime) {
        self.board.upsert(updated.clone());

        // A pending create may not have reached the store yet.
        let result = if self.outbox.contains(updated.id) {
            self.repo.save_task(&updated)
        } else {
            self.repo.update_task(&updated)
        };

        match result {
            Ok(()) => {
                self.outbox.discard(updated.id);
                info!(
                    "event=task_update module=service status=ok task_id={} completed={}",
                    updated.id, updated.completed
                );
            }
            Err(err) => self.persistence_failed(
                TaskChange::Save(updated.clone()),
                Rollback::Restore(previous),
                &updated,
                err,
                now,
            ),
        }
    }

    fn persistence_failed(
        &mut self,
        change: TaskChange,
        rollback: Rollback,
        task: &Task,
        err: RepoError,
        now: NaiveDateTime,
    ) {
        warn!(
            "event=task_persist module=service status=error task_id={} error_code=store_write_failed error={err}",
            task.id
        );
        self.outbox.record_failure(change, rollback, &err, now);
        self.notifier.notify(Notification::new(
            NotificationKind::Alert,
            SYNC_FAILED_TITLE,
            format!("Could not save \"{}\". Retrying in the background.", task.title),
            now,
        ));
    }

    fn notify_goal_achieved(&mut self, task: &Task, now: NaiveDateTime) {
        self.notifier.notify(Notification::new(
            NotificationKind::Success,
            GOAL_ACHIEVED_TITLE,
            format!("You completed \"{}\".", task.title),
            now,
        ));
    }
}
