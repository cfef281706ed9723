//! Motion dispatch module.
//!
//! Ties a line source, an extractor and the callback registry together
//! in a single background consumption loop.

mod motion_dispatcher;

pub use motion_dispatcher::{DispatchStats, MotionDispatcher};
