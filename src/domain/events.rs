//! Domain events for camera motion monitoring.

use std::time::SystemTime;

use super::EventKind;

/// A motion transition observed for one camera.
#[derive(Debug, Clone)]
pub struct MotionEvent {
    /// Wall-clock time when the event was observed
    pub timestamp: SystemTime,
    /// Opaque camera identifier as emitted by the log producer
    pub camera_id: String,
    /// Start or stop
    pub kind: EventKind,
}

impl MotionEvent {
    /// Create a new motion event stamped with the current time.
    pub fn new(camera_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            timestamp: SystemTime::now(),
            camera_id: camera_id.into(),
            kind,
        }
    }
}
