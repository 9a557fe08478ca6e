//! Core domain for Daybook: task templates, recurrence, occurrence selection
//! and the timer lifecycle, plus the storage contracts adapters implement.

pub mod clock;
pub mod ids;
pub mod lifecycle;
pub mod memory;
pub mod occurrence;
pub mod recurrence;
pub mod schedule;
pub mod session;
pub mod storage;
pub mod tasks;

pub use lifecycle::{EndedSession, Tracker, TrackerError};
