//! Log line sources.
//!
//! This module defines the `LineSource` trait and provides a
//! polling file follower. The dispatcher depends only on the trait,
//! so hosts and tests can feed lines from anywhere.

mod file_tail;

pub use file_tail::{FileTail, DEFAULT_POLL_INTERVAL};

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::SourceError;

/// A never-ending sequence of text lines appended to a log.
pub trait LineSource: Send {
    /// Start yielding lines.
    ///
    /// Lines are returned without their trailing newline. The iterator
    /// blocks while no new line is available and returns `None` only once
    /// the running flag has been cleared.
    fn lines(&mut self) -> Result<Box<dyn Iterator<Item = String> + '_>, SourceError>;

    /// Path of the log being followed.
    fn path(&self) -> &Path;

    /// Set the running flag for graceful shutdown.
    fn set_running(&mut self, running: Arc<AtomicBool>);
}
