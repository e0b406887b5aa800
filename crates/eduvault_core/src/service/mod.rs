//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into task CRUD use-cases.
//! - Keep host layers decoupled from storage details.

pub mod board;
pub mod outbox;
pub mod task_service;
