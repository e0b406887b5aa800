//! Planner host: wires the session clock to task CRUD and drives ticks.
//!
//! # Responsibility
//! - Apply clock events through the task service (completion, notifications).
//! - Replay pending task writes once per tick.
//! - Run ticks at a fixed period until stopped.
//!
//! # Invariants
//! - `Planner::tick` never fails; errors become logs or notifications.
//! - Ticks are strictly sequential on the caller's thread.
//! - The loop is owned by the host and ends when its `StopHandle` fires.

use crate::config::PlannerConfig;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::task::TaskId;
use crate::notify::Notifier;
use crate::planner::clock::Clock;
use crate::planner::session_clock::{ClockEvent, SessionClock, SessionError, TickReport};
use crate::planner::timer::ActiveSession;
use crate::repo::task_repo::TaskRepository;
use crate::service::task_service::TaskService;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SESSION_STARTED_TITLE: &str = "Study Session Started";
pub const SESSION_QUEUED_TITLE: &str = "Session Queued";

/// Task service plus session clock, ticked by the host.
pub struct Planner<R: TaskRepository, N: Notifier> {
    service: TaskService<R, N>,
    clock: SessionClock,
}

impl<R: TaskRepository, N: Notifier> Planner<R, N> {
    pub fn new(service: TaskService<R, N>, config: &PlannerConfig) -> Self {
        Self {
            service,
            clock: SessionClock::new(config.start_grace_minutes),
        }
    }

    pub fn service(&self) -> &TaskService<R, N> {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut TaskService<R, N> {
        &mut self.service
    }

    pub fn session_clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn into_service(self) -> TaskService<R, N> {
        self.service
    }

    /// Runs one clock tick at `now` and applies its events.
    pub fn tick(&mut self, now: NaiveDateTime) -> TickReport {
        self.service.flush_pending(now);
        let report = self.clock.tick(now, self.service.board());

        for event in &report.events {
            self.apply(event, now);
        }

        debug!(
            "event=clock_tick module=planner status=ok events={} active={}",
            report.events.len(),
            report.active.is_some()
        );
        report
    }

    /// Starts `task_id` immediately, outside its schedule.
    pub fn start_session(
        &mut self,
        task_id: TaskId,
        now: NaiveDateTime,
    ) -> Result<ActiveSession, SessionError> {
        let session = self.clock.start_now(task_id, self.service.board())?;
        self.notify_session_started(&session.title, session.seconds_remaining, now);
        Ok(session)
    }

    /// Abandons the running session; its task stays incomplete.
    pub fn abort_session(&mut self) -> Option<ActiveSession> {
        self.clock.abort()
    }

    fn apply(&mut self, event: &ClockEvent, now: NaiveDateTime) {
        match event {
            ClockEvent::SessionStarted {
                title,
                seconds_remaining,
                ..
            } => self.notify_session_started(title, *seconds_remaining, now),
            ClockEvent::SessionQueued { title, .. } => {
                self.service.notify(Notification::new(
                    NotificationKind::Info,
                    SESSION_QUEUED_TITLE,
                    format!("\"{title}\" will start when the current session ends."),
                    now,
                ));
            }
            ClockEvent::SessionCompleted { task_id, .. } => {
                match self.service.complete_task(*task_id, now) {
                    Ok(true) => {}
                    Ok(false) => info!(
                        "event=session_complete module=planner status=noop task_id={task_id} reason=already_completed"
                    ),
                    Err(err) => warn!(
                        "event=session_complete module=planner status=error task_id={task_id} error={err}"
                    ),
                }
            }
            ClockEvent::SessionAborted { .. } => {}
        }
    }

    fn notify_session_started(&mut self, title: &str, seconds: u64, now: NaiveDateTime) {
        let minutes = seconds.div_ceil(60);
        self.service.notify(Notification::new(
            NotificationKind::Task,
            SESSION_STARTED_TITLE,
            format!("Time to focus on \"{title}\" for {minutes} min."),
            now,
        ));
    }
}

/// Cross-thread signal that ends a running `ClockLoop`.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Shared flag, for registration with OS signal handlers.
    pub fn flag(&self) -> &Arc<AtomicBool> {
        &self.0
    }
}

/// Fixed-period ticker.
///
/// Deadlines are computed from the loop start so slow ticks do not
/// accumulate drift; a tick that overruns its slot is followed immediately
/// by the next.
pub struct ClockLoop<C: Clock> {
    clock: C,
    interval: Duration,
    stop: StopHandle,
    max_ticks: Option<u64>,
}

impl<C: Clock> ClockLoop<C> {
    pub fn new(clock: C, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            stop: StopHandle::default(),
            max_ticks: None,
        }
    }

    /// Ends the loop after `max_ticks` ticks.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ticks `planner` until stopped. Returns the number of ticks run.
    pub fn run<R, N>(
        &self,
        planner: &mut Planner<R, N>,
        mut on_tick: impl FnMut(&TickReport),
    ) -> u64
    where
        R: TaskRepository,
        N: Notifier,
    {
        let started_at = Instant::now();
        let mut ticks: u64 = 0;
        info!(
            "event=clock_loop module=planner status=start interval_ms={}",
            self.interval.as_millis()
        );

        while !self.stop.is_stopped() && self.max_ticks.map_or(true, |max| ticks < max) {
            let report = planner.tick(self.clock.now());
            on_tick(&report);
            ticks += 1;

            let deadline = started_at + self.interval.saturating_mul(saturating_u32(ticks));
            let now = Instant::now();
            if deadline > now && !self.stop.is_stopped() {
                std::thread::sleep(deadline - now);
            }
        }

        info!("event=clock_loop module=planner status=stop ticks={ticks}");
        ticks
    }
}

fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
