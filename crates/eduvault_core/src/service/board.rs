//! In-memory task list owned by the task service.
//!
//! # Invariants
//! - Tasks are kept sorted by `(date, time, id)`.
//! - `(id, revision)` identifies one board state: `id` is unique per instance
//!   (clones included) and `revision` increases on every mutation, so readers
//!   can detect change without diffing.
//! - Only the service layer mutates the board.

use crate::model::task::{Task, TaskId};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BOARD_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct TaskBoard {
    id: u64,
    tasks: Vec<Task>,
    revision: u64,
}

impl Default for TaskBoard {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Clone for TaskBoard {
    fn clone(&self) -> Self {
        Self {
            id: next_board_id(),
            tasks: self.tasks.clone(),
            revision: self.revision,
        }
    }
}

impl TaskBoard {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut board = Self {
            id: next_board_id(),
            tasks,
            revision: 0,
        };
        board.sort();
        board
    }

    /// Process-unique instance id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks scheduled on `date`, in start order.
    pub fn on_date(&self, date: NaiveDate) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |task| task.date == date)
    }

    pub(crate) fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
        self.sort();
        self.revision += 1;
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<Task> {
        let position = self.tasks.iter().position(|task| task.id == id)?;
        self.revision += 1;
        Some(self.tasks.remove(position))
    }

    pub(crate) fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.sort();
        self.revision += 1;
    }

    fn sort(&mut self) {
        self.tasks
            .sort_by(|a, b| (a.date, a.time, a.id).cmp(&(b.date, b.time, b.id)));
    }
}

fn next_board_id() -> u64 {
    NEXT_BOARD_ID.fetch_add(1, Ordering::Relaxed)
}
