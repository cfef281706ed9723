//! Per-camera callback storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::EventKind;

/// Handler invoked with the camera identifier and the event kind.
pub(crate) type MotionHandler = Arc<dyn Fn(&str, EventKind) + Send + Sync>;

type HandlerMap = RwLock<HashMap<String, MotionHandler>>;

/// Thread-safe mapping from (camera, event kind) to a handler.
///
/// At most one handler is stored per key; registering again replaces it.
/// Lookups clone the handler out of the map, so no lock is held while a
/// handler runs and handlers may themselves register or unregister.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    start: HandlerMap,
    stop: HandlerMap,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` for `camera_id`, replacing any previous one.
    pub fn register(&self, kind: EventKind, camera_id: impl Into<String>, handler: MotionHandler) {
        write(self.map(kind)).insert(camera_id.into(), handler);
    }

    /// Remove the handler for `camera_id`. Returns true if one was removed.
    pub fn unregister(&self, kind: EventKind, camera_id: &str) -> bool {
        write(self.map(kind)).remove(camera_id).is_some()
    }

    /// Look up the handler for `camera_id`.
    pub fn get(&self, kind: EventKind, camera_id: &str) -> Option<MotionHandler> {
        read(self.map(kind)).get(camera_id).cloned()
    }

    pub fn is_registered(&self, kind: EventKind, camera_id: &str) -> bool {
        read(self.map(kind)).contains_key(camera_id)
    }

    fn map(&self, kind: EventKind) -> &HandlerMap {
        match kind {
            EventKind::Start => &self.start,
            EventKind::Stop => &self.stop,
        }
    }
}

// A panicking handler never runs under these locks, but recover from
// poisoning anyway so one bad caller cannot disable the registry.
fn read(map: &HandlerMap) -> RwLockReadGuard<'_, HashMap<String, MotionHandler>> {
    map.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(map: &HandlerMap) -> RwLockWriteGuard<'_, HashMap<String, MotionHandler>> {
    map.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
