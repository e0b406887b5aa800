//! Active session countdown.
//!
//! State machine: `Idle → Running → Completed → Idle`. One timer exists per
//! planner, so at most one session is ever running.

use crate::model::task::TaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Ephemeral focus session; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub task_id: TaskId,
    pub title: String,
    pub total_seconds: u64,
    pub seconds_remaining: u64,
}

impl ActiveSession {
    pub fn new(task_id: TaskId, title: impl Into<String>, total_seconds: u64) -> Self {
        Self {
            task_id,
            title: title.into(),
            total_seconds,
            seconds_remaining: total_seconds,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.total_seconds - self.seconds_remaining
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    /// Terminal for one session; reset to `Idle` once handled.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    AlreadyRunning(TaskId),
    ZeroDuration(TaskId),
}

impl Display for TimerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning(id) => write!(f, "a session is already running for task {id}"),
            Self::ZeroDuration(id) => write!(f, "task {id} has no session time"),
        }
    }
}

impl Error for TimerError {}

/// Result of advancing the timer by one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTick {
    Idle,
    Running { seconds_remaining: u64 },
    Completed(ActiveSession),
}

#[derive(Debug, Clone)]
pub struct SessionTimer {
    phase: SessionPhase,
    session: Option<ActiveSession>,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTimer {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            session: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    /// Starts a session from `Idle` (or an unhandled `Completed`).
    pub fn start(&mut self, session: ActiveSession) -> Result<(), TimerError> {
        if let Some(current) = self.session.as_ref() {
            return Err(TimerError::AlreadyRunning(current.task_id));
        }
        if session.seconds_remaining == 0 {
            return Err(TimerError::ZeroDuration(session.task_id));
        }
        self.session = Some(session);
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Decrements a running session by one second.
    ///
    /// Transitions to `Completed` on the tick that reaches zero.
    pub fn tick(&mut self) -> TimerTick {
        let Some(session) = self.session.as_mut() else {
            return TimerTick::Idle;
        };
        session.seconds_remaining = session.seconds_remaining.saturating_sub(1);
        if session.seconds_remaining > 0 {
            return TimerTick::Running {
                seconds_remaining: session.seconds_remaining,
            };
        }

        self.phase = SessionPhase::Completed;
        match self.session.take() {
            Some(finished) => TimerTick::Completed(finished),
            None => TimerTick::Idle,
        }
    }

    /// Acknowledges a completed session.
    pub fn reset(&mut self) {
        if self.phase == SessionPhase::Completed {
            self.phase = SessionPhase::Idle;
        }
    }

    /// Stops a running session without completing its task.
    pub fn abort(&mut self) -> Option<ActiveSession> {
        let session = self.session.take()?;
        self.phase = SessionPhase::Idle;
        Some(session)
    }
}
