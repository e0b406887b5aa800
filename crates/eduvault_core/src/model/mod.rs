//! Planner domain model.
//!
//! # Responsibility
//! - Define the study task record and the notification record.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Deletion is a hard delete; no other entity references a task.

pub mod notification;
pub mod task;
