//! Domain models for camera motion monitoring.
//!
//! This module contains the core domain types that are independent
//! of how log lines are read or how events are reported.

mod events;
mod motion;

pub use events::MotionEvent;
pub use motion::EventKind;
