//! Reporting module for motion events.
//!
//! This module defines the `EventReporter` trait and provides
//! implementations for different output formats.

mod console_reporter;

pub use console_reporter::ConsoleReporter;

use std::path::Path;

use crate::domain::MotionEvent;

/// Trait for reporting motion events.
///
/// This trait is intentionally minimal - it only handles reporting,
/// not filtering or dispatch.
pub trait EventReporter: Send + Sync {
    /// Report a motion event.
    fn report(&self, event: &MotionEvent);

    /// Called when watching starts.
    fn on_start(&self, log_path: &Path, cameras: &[String]);

    /// Called when watching stops.
    fn on_stop(&self);
}
