//! Task store abstractions and persistence backends.
//!
//! # Responsibility
//! - Define the task persistence contract used by the CRUD service.
//! - Provide hosted (SQLite, per-user rows) and offline (JSON file) backends.
//!
//! # Invariants
//! - Writes enforce `Task::validate()` before persistence.
//! - Missing rows surface as `RepoError::NotFound`, not silent no-ops.

pub mod local_store;
pub mod task_repo;
