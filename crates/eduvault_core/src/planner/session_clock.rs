//! Per-tick session detection and countdown.
//!
//! # Responsibility
//! - Find the next upcoming incomplete task for today.
//! - Start a focus session when a task's start minute is reached.
//! - Advance the running session and report its completion.
//!
//! # Invariants
//! - Only tasks dated on the tick's calendar day can start.
//! - A task auto-starts at most once per day, however often its minute is
//!   evaluated.
//! - At most one session runs; simultaneous starts queue FIFO and begin as
//!   soon as the running session ends.
//! - The tick that starts a session does not decrement it.
//! - The clock never mutates tasks; completion is reported as an event for
//!   the host to apply through the task service.

use crate::model::task::{Task, TaskId, TaskValidationError};
use crate::planner::index::UpcomingIndex;
use crate::planner::timer::{ActiveSession, SessionPhase, SessionTimer, TimerError, TimerTick};
use crate::service::board::TaskBoard;
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use std::collections::{HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a running session stopped without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The task was deleted from the board.
    TaskRemoved,
    /// The task was marked complete by other means.
    TaskCompleted,
}

/// Something the host should react to after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockEvent {
    SessionStarted {
        task_id: TaskId,
        title: String,
        seconds_remaining: u64,
    },
    /// Due while another session was running; starts when that one ends.
    SessionQueued { task_id: TaskId, title: String },
    /// Countdown reached zero; the host must mark the task complete.
    SessionCompleted { task_id: TaskId, title: String },
    SessionAborted { task_id: TaskId, reason: AbortReason },
}

/// The nearest future task today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingTask {
    pub task_id: TaskId,
    pub title: String,
    pub starts_at: NaiveDateTime,
    pub seconds_until: i64,
}

/// Snapshot produced by one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub now: NaiveDateTime,
    pub next_upcoming: Option<UpcomingTask>,
    pub active: Option<ActiveSession>,
    pub events: Vec<ClockEvent>,
}

/// Manual session start failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    TaskNotFound(TaskId),
    TaskCompleted(TaskId),
    InvalidTask {
        task_id: TaskId,
        reason: TaskValidationError,
    },
    Timer(TimerError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::TaskCompleted(id) => write!(f, "task {id} is already complete"),
            Self::InvalidTask { task_id, reason } => {
                write!(f, "task {task_id} cannot be scheduled: {reason}")
            }
            Self::Timer(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTask { reason, .. } => Some(reason),
            Self::Timer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TimerError> for SessionError {
    fn from(value: TimerError) -> Self {
        Self::Timer(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    timer: SessionTimer,
    index: UpcomingIndex,
    grace_minutes: u32,
    day: Option<NaiveDate>,
    started_today: HashSet<TaskId>,
    queue: VecDeque<TaskId>,
}

impl SessionClock {
    /// `grace_minutes = 0` keeps exact-minute start matching.
    pub fn new(grace_minutes: u32) -> Self {
        Self {
            grace_minutes,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.timer.phase()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.timer.active()
    }

    /// Tasks waiting for the running session to end, in start order.
    pub fn queued(&self) -> impl Iterator<Item = &TaskId> {
        self.queue.iter()
    }

    /// Advances the clock to `now` against the current board.
    pub fn tick(&mut self, now: NaiveDateTime, board: &TaskBoard) -> TickReport {
        let mut events = Vec::new();

        self.roll_day(now.date());
        self.index.refresh(board);
        self.drop_stale_session(board, &mut events);

        let was_running = self.timer.is_running();
        if !was_running {
            self.start_from_queue(board, &mut events);
        }

        for (_, task_id) in self.index.due_at(now, self.grace_minutes) {
            if !self.started_today.insert(task_id) {
                continue;
            }
            let Some(task) = board.get(task_id) else {
                continue;
            };
            if self.timer.is_running() {
                info!("event=session_queue module=planner status=ok task_id={task_id}");
                self.queue.push_back(task_id);
                events.push(ClockEvent::SessionQueued {
                    task_id,
                    title: task.title.clone(),
                });
            } else {
                self.begin(task, &mut events);
            }
        }

        if was_running {
            if let TimerTick::Completed(session) = self.timer.tick() {
                self.timer.reset();
                info!(
                    "event=session_complete module=planner status=ok task_id={} seconds={}",
                    session.task_id, session.total_seconds
                );
                events.push(ClockEvent::SessionCompleted {
                    task_id: session.task_id,
                    title: session.title,
                });
                self.start_from_queue(board, &mut events);
            }
        }

        let next_upcoming = self.index.next_after(now).and_then(|(starts_at, task_id)| {
            board.get(task_id).map(|task| UpcomingTask {
                task_id,
                title: task.title.clone(),
                starts_at,
                seconds_until: (starts_at - now).num_seconds(),
            })
        });

        TickReport {
            now,
            next_upcoming,
            active: self.timer.active().cloned(),
            events,
        }
    }

    /// Starts a session for `task_id` immediately, outside its schedule.
    pub fn start_now(
        &mut self,
        task_id: TaskId,
        board: &TaskBoard,
    ) -> Result<ActiveSession, SessionError> {
        let task = board
            .get(task_id)
            .ok_or(SessionError::TaskNotFound(task_id))?;
        if task.completed {
            return Err(SessionError::TaskCompleted(task_id));
        }
        task.validate()
            .map_err(|reason| SessionError::InvalidTask { task_id, reason })?;

        self.timer.start(ActiveSession::new(
            task.id,
            task.title.clone(),
            task.duration_seconds(),
        ))?;
        self.started_today.insert(task_id);
        self.queue.retain(|queued| *queued != task_id);
        info!("event=session_start module=planner status=ok trigger=manual task_id={task_id}");

        self.timer
            .active()
            .cloned()
            .ok_or(SessionError::TaskNotFound(task_id))
    }

    /// Stops the running session without completing its task.
    ///
    /// Queued tasks start on the next tick.
    pub fn abort(&mut self) -> Option<ActiveSession> {
        let session = self.timer.abort()?;
        info!(
            "event=session_abort module=planner status=ok task_id={} reason=requested",
            session.task_id
        );
        Some(session)
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if self.day == Some(today) {
            return;
        }
        if self.day.is_some() {
            self.started_today.clear();
            self.queue.clear();
        }
        self.day = Some(today);
    }

    fn drop_stale_session(&mut self, board: &TaskBoard, events: &mut Vec<ClockEvent>) {
        let Some(active) = self.timer.active() else {
            return;
        };
        let reason = match board.get(active.task_id) {
            None => AbortReason::TaskRemoved,
            Some(task) if task.completed => AbortReason::TaskCompleted,
            Some(_) => return,
        };
        if let Some(session) = self.timer.abort() {
            info!(
                "event=session_abort module=planner status=ok task_id={} reason={reason:?}",
                session.task_id
            );
            events.push(ClockEvent::SessionAborted {
                task_id: session.task_id,
                reason,
            });
        }
    }

    fn start_from_queue(&mut self, board: &TaskBoard, events: &mut Vec<ClockEvent>) {
        while let Some(task_id) = self.queue.pop_front() {
            match board.get(task_id) {
                Some(task) if !task.completed && task.validate().is_ok() => {
                    self.begin(task, events);
                    return;
                }
                _ => info!(
                    "event=session_queue module=planner status=dropped task_id={task_id}"
                ),
            }
        }
    }

    fn begin(&mut self, task: &Task, events: &mut Vec<ClockEvent>) {
        let session = ActiveSession::new(task.id, task.title.clone(), task.duration_seconds());
        let seconds_remaining = session.seconds_remaining;
        match self.timer.start(session) {
            Ok(()) => {
                info!(
                    "event=session_start module=planner status=ok trigger=schedule task_id={} seconds={seconds_remaining}",
                    task.id
                );
                events.push(ClockEvent::SessionStarted {
                    task_id: task.id,
                    title: task.title.clone(),
                    seconds_remaining,
                });
            }
            Err(err) => warn!(
                "event=session_start module=planner status=error task_id={} error={err}",
                task.id
            ),
        }
    }
}
