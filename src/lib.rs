//! Motionwatch - camera motion log watcher.
//!
//! Follows the application log of a network video recorder and turns
//! `Camera[<id>] type:start|stop` lines into per-camera callbacks.
//!
//! The pipeline is:
//! - [`source`]: follows the log file across rotation and truncation
//! - [`parser`]: extracts a camera ID and event token from each line
//! - `registry`: stores start and stop handlers per camera
//! - [`dispatcher`]: runs the consumption loop and invokes handlers

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod parser;
mod registry;
pub mod reporter;
pub mod source;

pub use config::Config;
pub use dispatcher::{DispatchStats, MotionDispatcher};
pub use domain::{EventKind, MotionEvent};
pub use error::{ConfigError, DispatchError, SourceError};
pub use parser::{EventExtractor, Extraction, RegexExtractor};
pub use reporter::{ConsoleReporter, EventReporter};
pub use source::{FileTail, LineSource};
