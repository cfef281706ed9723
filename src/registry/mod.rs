//! Callback registry module.
//!
//! Holds the per-camera handlers the dispatcher invokes, one map per
//! event kind.

mod callback_registry;

pub(crate) use callback_registry::{CallbackRegistry, MotionHandler};
