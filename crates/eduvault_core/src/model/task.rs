//! Study task domain model.
//!
//! # Responsibility
//! - Define the canonical scheduled study task shared by store, CRUD and clock.
//! - Validate creation-form input before anything reaches persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `time` has minute granularity (seconds are always zero).
//! - `duration_minutes` is strictly positive.
//! - `title` is non-empty after trimming.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a study task.
pub type TaskId = Uuid;

/// Storage and wire format for task dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Storage and wire format for task start times.
pub const TIME_FORMAT: &str = "%H:%M";

const TITLE_MAX_CHARS: usize = 200;
const DURATION_MAX_MINUTES: u32 = 24 * 60;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid time regex"));

/// Task priority shown in the planner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Stable lowercase label used by storage and CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses a stored/CLI label. Case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Validation failure for task input or persisted task state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    TitleTooLong { max_chars: usize },
    InvalidDate(String),
    InvalidTime(String),
    /// Time carries a seconds component; starts match on whole minutes only.
    TimeNotMinuteAligned(String),
    NonPositiveDuration,
    DurationTooLong { max_minutes: u32 },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title cannot be empty"),
            Self::TitleTooLong { max_chars } => {
                write!(f, "task title cannot exceed {max_chars} characters")
            }
            Self::InvalidDate(value) => write!(f, "invalid date `{value}`; expected YYYY-MM-DD"),
            Self::InvalidTime(value) => write!(f, "invalid time `{value}`; expected HH:MM"),
            Self::TimeNotMinuteAligned(value) => {
                write!(f, "time `{value}` must not carry seconds")
            }
            Self::NonPositiveDuration => write!(f, "duration must be greater than zero"),
            Self::DurationTooLong { max_minutes } => {
                write!(f, "duration cannot exceed {max_minutes} minutes")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical scheduled study task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    /// Serialized as `duration` to match the hosted table shape.
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    /// Creates an incomplete task with a generated stable ID.
    ///
    /// Does not validate; use [`TaskDraft::into_task`] for user input.
    pub fn new(
        title: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: u32,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            date,
            time,
            duration_minutes,
            completed: false,
            priority,
        }
    }

    /// Checks model invariants.
    ///
    /// Called by stores on every write and read, and by the session clock
    /// before a task is considered for scheduling.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_title(&self.title)?;
        if self.time.second() != 0 || self.time.nanosecond() != 0 {
            return Err(TaskValidationError::TimeNotMinuteAligned(
                self.time.format("%H:%M:%S").to_string(),
            ));
        }
        validate_duration(self.duration_minutes)
    }

    /// Scheduled start as a local date-time.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Focus session length in seconds.
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// `HH:MM` label for display and storage.
    pub fn time_label(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }

    /// `YYYY-MM-DD` label for display and storage.
    pub fn date_label(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

/// Unvalidated creation/edit form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`, 24-hour.
    pub time: String,
    pub duration_minutes: u32,
    pub priority: Priority,
}

impl TaskDraft {
    /// Validates the draft and produces a fresh incomplete task.
    ///
    /// # Errors
    /// - Returns the first failing field check; nothing is persisted.
    pub fn into_task(self) -> Result<Task, TaskValidationError> {
        let fields = self.validate()?;
        Ok(Task::new(
            fields.title,
            fields.date,
            fields.time,
            fields.duration_minutes,
            fields.priority,
        ))
    }

    /// Applies the draft's fields onto an existing task, keeping `id` and
    /// `completed`.
    pub fn apply_to(self, task: &Task) -> Result<Task, TaskValidationError> {
        let fields = self.validate()?;
        Ok(Task {
            id: task.id,
            title: fields.title,
            date: fields.date,
            time: fields.time,
            duration_minutes: fields.duration_minutes,
            completed: task.completed,
            priority: fields.priority,
        })
    }

    fn validate(self) -> Result<ValidFields, TaskValidationError> {
        let title = self.title.trim().to_string();
        validate_title(&title)?;
        let date = parse_date(&self.date)?;
        let time = parse_time(&self.time)?;
        validate_duration(self.duration_minutes)?;
        Ok(ValidFields {
            title,
            date,
            time,
            duration_minutes: self.duration_minutes,
            priority: self.priority,
        })
    }
}

struct ValidFields {
    title: String,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: u32,
    priority: Priority,
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, TaskValidationError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| TaskValidationError::InvalidDate(trimmed.to_string()))
}

/// Parses a strict 24-hour `HH:MM` time.
pub fn parse_time(value: &str) -> Result<NaiveTime, TaskValidationError> {
    let trimmed = value.trim();
    let caps = TIME_RE
        .captures(trimmed)
        .ok_or_else(|| TaskValidationError::InvalidTime(trimmed.to_string()))?;
    let hour = caps[1]
        .parse::<u32>()
        .map_err(|_| TaskValidationError::InvalidTime(trimmed.to_string()))?;
    let minute = caps[2]
        .parse::<u32>()
        .map_err(|_| TaskValidationError::InvalidTime(trimmed.to_string()))?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| TaskValidationError::InvalidTime(trimmed.to_string()))
}

fn validate_title(title: &str) -> Result<(), TaskValidationError> {
    if title.trim().is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(TaskValidationError::TitleTooLong {
            max_chars: TITLE_MAX_CHARS,
        });
    }
    Ok(())
}

fn validate_duration(duration_minutes: u32) -> Result<(), TaskValidationError> {
    if duration_minutes == 0 {
        return Err(TaskValidationError::NonPositiveDuration);
    }
    if duration_minutes > DURATION_MAX_MINUTES {
        return Err(TaskValidationError::DurationTooLong {
            max_minutes: DURATION_MAX_MINUTES,
        });
    }
    Ok(())
}

mod hhmm {
    use super::{parse_time, TIME_FORMAT};
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
