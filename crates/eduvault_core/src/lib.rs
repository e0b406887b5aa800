//! Core study-planner logic for EduVault.
//! This crate is the single source of truth for task and session invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod planner;
pub mod repo;
pub mod service;
pub mod stats;

pub use config::{load_config, AppConfig, ConfigError, PlannerConfig, RetryPolicy, StorageConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::notification::{Notification, NotificationKind};
pub use model::task::{Priority, Task, TaskDraft, TaskId, TaskValidationError};
pub use notify::{NotificationCenter, Notifier};
pub use planner::calendar::{CalendarError, CalendarMonth};
pub use planner::clock::{Clock, ManualClock, SystemClock};
pub use planner::runtime::{ClockLoop, Planner, StopHandle};
pub use planner::session_clock::{
    AbortReason, ClockEvent, SessionClock, SessionError, TickReport, UpcomingTask,
};
pub use planner::timer::{ActiveSession, SessionPhase};
pub use repo::local_store::JsonTaskStore;
pub use repo::task_repo::{
    RepoError, RepoResult, SqliteTaskRepository, TaskListQuery, TaskRepository,
};
pub use service::board::TaskBoard;
pub use service::task_service::{TaskService, TaskServiceError};
pub use stats::StudyStats;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
