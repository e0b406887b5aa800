//! Sorted index of schedulable tasks.
//!
//! Keyed by `(start, id)` so both "next upcoming" and "due now" are range
//! lookups. Rebuilt only when the board instance or its revision changes.

use crate::model::task::TaskId;
use crate::service::board::TaskBoard;
use chrono::{Duration, NaiveDateTime, Timelike};
use log::warn;
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct UpcomingIndex {
    entries: BTreeSet<(NaiveDateTime, TaskId)>,
    /// `(board id, revision)` of the last build.
    built_from: Option<(u64, u64)>,
}

impl UpcomingIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds from the board if it changed since the last build.
    ///
    /// Completed tasks are left out; tasks failing validation are logged and
    /// skipped.
    pub fn refresh(&mut self, board: &TaskBoard) {
        let state = (board.id(), board.revision());
        if self.built_from == Some(state) {
            return;
        }
        self.entries.clear();
        for task in board.tasks().iter().filter(|task| !task.completed) {
            match task.validate() {
                Ok(()) => {
                    self.entries.insert((task.starts_at(), task.id));
                }
                Err(err) => warn!(
                    "event=clock_skip_task module=planner status=skipped task_id={} reason={err}",
                    task.id
                ),
            }
        }
        self.built_from = Some(state);
    }

    /// First entry starting strictly after `now` on the same calendar day.
    pub fn next_after(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, TaskId)> {
        self.entries
            .range((now, Uuid::nil())..)
            .find(|(starts_at, _)| *starts_at > now)
            .filter(|(starts_at, _)| starts_at.date() == now.date())
            .copied()
    }

    /// Entries whose start minute is within `grace_minutes` before `now`'s
    /// minute (inclusive) and on `now`'s date, in start order.
    pub fn due_at(&self, now: NaiveDateTime, grace_minutes: u32) -> Vec<(NaiveDateTime, TaskId)> {
        let minute = floor_to_minute(now);
        let lower = minute - Duration::minutes(i64::from(grace_minutes));
        let upper = minute + Duration::minutes(1);
        self.entries
            .range((lower, Uuid::nil())..(upper, Uuid::nil()))
            .filter(|(starts_at, _)| starts_at.date() == now.date())
            .copied()
            .collect()
    }
}

fn floor_to_minute(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(now)
}
