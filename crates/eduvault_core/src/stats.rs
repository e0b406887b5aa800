//! Study statistics derived from the task list.

use crate::model::task::{Priority, Task};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Whole percent of tasks completed; `0` for an empty list.
    pub completion_rate: u8,
    /// Sum of durations of completed tasks.
    pub focus_minutes: u64,
    pub today_total: usize,
    pub today_completed: usize,
    pub high_priority_pending: usize,
    /// Consecutive days with at least one completed task, ending today (or
    /// yesterday when nothing is completed yet today).
    pub streak_days: u32,
}

impl StudyStats {
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let focus_minutes = tasks
            .iter()
            .filter(|task| task.completed)
            .map(|task| u64::from(task.duration_minutes))
            .sum();
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed * 100) / total) as u8
        };

        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate,
            focus_minutes,
            today_total: tasks.iter().filter(|task| task.date == today).count(),
            today_completed: tasks
                .iter()
                .filter(|task| task.date == today && task.completed)
                .count(),
            high_priority_pending: tasks
                .iter()
                .filter(|task| !task.completed && task.priority == Priority::High)
                .count(),
            streak_days: streak_days(tasks, today),
        }
    }
}

fn streak_days(tasks: &[Task], today: NaiveDate) -> u32 {
    let active_days: BTreeSet<NaiveDate> = tasks
        .iter()
        .filter(|task| task.completed && task.date <= today)
        .map(|task| task.date)
        .collect();

    let mut cursor = if active_days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };
    let mut streak = 0;
    while active_days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}
