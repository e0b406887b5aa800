//! Uncommitted task writes awaiting replay.
//!
//! # Responsibility
//! - Remember writes the store rejected so the board can stay optimistic.
//! - Replay them with exponential backoff and report exhausted entries.
//!
//! # Invariants
//! - At most one pending entry per task; a newer intent replaces the older
//!   one but keeps the oldest rollback (the last committed state).
//! - An entry is dropped when it commits or exhausts `max_attempts`.

use crate::config::RetryPolicy;
use crate::model::task::{Task, TaskId};
use crate::repo::task_repo::{RepoError, TaskRepository};
use chrono::NaiveDateTime;
use log::{info, warn};

/// Write intent to replay against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskChange {
    Save(Task),
    Delete(TaskId),
}

impl TaskChange {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Save(task) => task.id,
            Self::Delete(id) => *id,
        }
    }
}

/// Board correction applied when a change can never be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// The task never existed in the store.
    Remove(TaskId),
    /// The store still holds this state.
    Restore(Task),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub change: TaskChange,
    pub rollback: Rollback,
    /// Failed attempts so far, including the initial write.
    pub attempts: u32,
    pub next_attempt_at: NaiveDateTime,
    pub last_error: String,
}

/// Outcome of one replay pass.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub committed: Vec<TaskId>,
    pub exhausted: Vec<PendingChange>,
}

#[derive(Debug, Clone)]
pub struct Outbox {
    policy: RetryPolicy,
    entries: Vec<PendingChange>,
}

impl Outbox {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[PendingChange] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.iter().any(|entry| entry.change.task_id() == id)
    }

    /// Records a write that just failed once.
    pub fn record_failure(
        &mut self,
        change: TaskChange,
        rollback: Rollback,
        error: &RepoError,
        now: NaiveDateTime,
    ) {
        let id = change.task_id();
        let next_attempt_at = now + self.policy.delay_after(1);
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.change.task_id() == id)
        {
            Some(entry) => {
                entry.change = change;
                entry.attempts = 1;
                entry.next_attempt_at = next_attempt_at;
                entry.last_error = error.to_string();
            }
            None => self.entries.push(PendingChange {
                change,
                rollback,
                attempts: 1,
                next_attempt_at,
                last_error: error.to_string(),
            }),
        }
    }

    /// Drops the pending entry for `id`, e.g. after a newer write committed.
    pub fn discard(&mut self, id: TaskId) -> Option<PendingChange> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.change.task_id() == id)?;
        Some(self.entries.remove(position))
    }

    /// Replays every entry whose backoff has elapsed.
    pub fn flush(&mut self, repo: &impl TaskRepository, now: NaiveDateTime) -> FlushReport {
        let mut report = FlushReport::default();
        let mut remaining = Vec::with_capacity(self.entries.len());

        for mut entry in self.entries.drain(..) {
            if entry.next_attempt_at > now {
                remaining.push(entry);
                continue;
            }

            let task_id = entry.change.task_id();
            if entry.attempts >= self.policy.max_attempts {
                report.exhausted.push(entry);
                continue;
            }

            match replay(repo, &entry.change) {
                Ok(()) => {
                    info!(
                        "event=outbox_replay module=service status=ok task_id={task_id} attempts={}",
                        entry.attempts + 1
                    );
                    report.committed.push(task_id);
                }
                Err(err) => {
                    entry.attempts += 1;
                    entry.last_error = err.to_string();
                    if entry.attempts >= self.policy.max_attempts {
                        warn!(
                            "event=outbox_replay module=service status=exhausted task_id={task_id} attempts={} error={err}",
                            entry.attempts
                        );
                        report.exhausted.push(entry);
                    } else {
                        entry.next_attempt_at = now + self.policy.delay_after(entry.attempts);
                        warn!(
                            "event=outbox_replay module=service status=retry task_id={task_id} attempts={} error={err}",
                            entry.attempts
                        );
                        remaining.push(entry);
                    }
                }
            }
        }

        self.entries = remaining;
        report
    }
}

fn replay(repo: &impl TaskRepository, change: &TaskChange) -> Result<(), RepoError> {
    match change {
        TaskChange::Save(task) => repo.save_task(task),
        TaskChange::Delete(id) => match repo.delete_task(*id) {
            Ok(()) | Err(RepoError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        },
    }
}
