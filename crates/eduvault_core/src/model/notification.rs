//! Host-facing notification record.
//!
//! # Responsibility
//! - Describe toast/inbox entries requested by planner components.
//!
//! # Invariants
//! - `kind` is decided by the emitter: `Task` for session starts, `Success`
//!   for completions, `Alert` for persistence failures.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification category consumed by the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A scheduled study session has started.
    Task,
    /// A goal was reached.
    Success,
    /// A non-fatal failure the user should know about.
    Alert,
    /// Neutral information.
    Info,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Success => "success",
            Self::Alert => "alert",
            Self::Info => "info",
        }
    }
}

/// One notification entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: NaiveDateTime,
    pub read: bool,
}

impl Notification {
    /// Creates an unread notification with a generated ID.
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
            created_at,
            read: false,
        }
    }
}
