//! Study planner: calendar grid, session clock and focus timer.
//!
//! # Responsibility
//! - Detect scheduled task starts and run one focus session at a time.
//! - Drive ticks from an injectable clock so tests can use virtual time.

pub mod calendar;
pub mod clock;
pub mod index;
pub mod runtime;
pub mod session_clock;
pub mod timer;
