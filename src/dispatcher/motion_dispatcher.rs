//! Log-tail-to-callback dispatcher.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, trace};

use crate::config::Config;
use crate::domain::EventKind;
use crate::error::{ConfigError, DispatchError};
use crate::parser::{EventExtractor, RegexExtractor};
use crate::registry::{CallbackRegistry, MotionHandler};
use crate::source::{FileTail, LineSource, DEFAULT_POLL_INTERVAL};

/// Counters describing what the consumption loop has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Lines received from the source
    pub lines_read: u64,
    /// Lines carrying a start or stop event
    pub events_matched: u64,
    /// Handler invocations, including ones that panicked
    pub handlers_invoked: u64,
    /// Handler invocations that panicked
    pub handler_faults: u64,
}

#[derive(Default)]
struct DispatchCounters {
    lines_read: AtomicU64,
    events_matched: AtomicU64,
    handlers_invoked: AtomicU64,
    handler_faults: AtomicU64,
}

impl DispatchCounters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            events_matched: self.events_matched.load(Ordering::Relaxed),
            handlers_invoked: self.handlers_invoked.load(Ordering::Relaxed),
            handler_faults: self.handler_faults.load(Ordering::Relaxed),
        }
    }
}

/// Watches a camera motion log and invokes per-camera callbacks.
///
/// The dispatcher follows the log from the end it had at construction
/// time, so historical lines are never replayed. Every appended line is
/// run through the extractor and, if it names a camera with a handler
/// registered for that event kind, the handler is called on the
/// dispatcher's thread before the next line is read. Handlers therefore
/// fire in file order, and a slow handler delays the ones after it.
///
/// A panicking handler is logged and counted; the loop keeps running.
///
/// # Example
///
/// ```rust,no_run
/// use motionwatch::MotionDispatcher;
///
/// # fn example() -> Result<(), motionwatch::DispatchError> {
/// let dispatcher = MotionDispatcher::watch("/var/log/unifi-video/motion.log")?;
/// dispatcher.register_start("F09FC22F4D1D", |camera, kind| {
///     println!("{camera}: motion {kind}");
/// });
/// # Ok(())
/// # }
/// ```
pub struct MotionDispatcher {
    path: PathBuf,
    registry: Arc<CallbackRegistry>,
    counters: Arc<DispatchCounters>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MotionDispatcher {
    /// Watch `path` with the default extraction pattern.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::NotFound` if the log does not exist and
    /// `DispatchError::Io` if it cannot be opened.
    pub fn watch(path: impl AsRef<Path>) -> Result<Self, DispatchError> {
        Self::watch_with(path, Arc::new(RegexExtractor::default()), DEFAULT_POLL_INTERVAL)
    }

    /// Watch `path` with a custom extractor and end-of-file poll interval.
    pub fn watch_with(
        path: impl AsRef<Path>,
        extractor: Arc<dyn EventExtractor>,
        poll_interval: Duration,
    ) -> Result<Self, DispatchError> {
        let source = FileTail::at_end(path)?.with_poll_interval(poll_interval);
        Self::spawn(source, extractor)
    }

    /// Watch the log named by `config`, using its pattern and poll interval.
    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        let path = config.log_path.as_ref().ok_or(ConfigError::MissingLogPath)?;
        let extractor = RegexExtractor::new(&config.pattern)?;
        Self::watch_with(path, Arc::new(extractor), config.poll_interval)
    }

    /// Start dispatching lines from an already opened source.
    pub fn spawn<S>(mut source: S, extractor: Arc<dyn EventExtractor>) -> Result<Self, DispatchError>
    where
        S: LineSource + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        source.set_running(running.clone());

        let path = source.path().to_path_buf();
        let registry = Arc::new(CallbackRegistry::new());
        let counters = Arc::new(DispatchCounters::default());

        let dispatch_loop = DispatchLoop {
            extractor,
            registry: registry.clone(),
            counters: counters.clone(),
        };

        let handle = thread::Builder::new()
            .name("motion-dispatch".to_string())
            .spawn(move || dispatch_loop.run(source))
            .map_err(DispatchError::Spawn)?;

        info!("Watching {} for motion events", path.display());

        Ok(Self {
            path,
            registry,
            counters,
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Call `handler` whenever `camera_id` reports motion starting.
    ///
    /// Replaces any start handler already registered for the camera.
    pub fn register_start<F>(&self, camera_id: impl Into<String>, handler: F)
    where
        F: Fn(&str, EventKind) + Send + Sync + 'static,
    {
        self.register(EventKind::Start, camera_id.into(), Arc::new(handler));
    }

    /// Call `handler` whenever `camera_id` reports motion stopping.
    ///
    /// Replaces any stop handler already registered for the camera.
    pub fn register_stop<F>(&self, camera_id: impl Into<String>, handler: F)
    where
        F: Fn(&str, EventKind) + Send + Sync + 'static,
    {
        self.register(EventKind::Stop, camera_id.into(), Arc::new(handler));
    }

    /// Remove the start handler for `camera_id`, if any.
    pub fn unregister_start(&self, camera_id: &str) -> bool {
        self.registry.unregister(EventKind::Start, camera_id)
    }

    /// Remove the stop handler for `camera_id`, if any.
    pub fn unregister_stop(&self, camera_id: &str) -> bool {
        self.registry.unregister(EventKind::Stop, camera_id)
    }

    pub fn is_registered(&self, kind: EventKind, camera_id: &str) -> bool {
        self.registry.is_registered(kind, camera_id)
    }

    fn register(&self, kind: EventKind, camera_id: String, handler: MotionHandler) {
        trace!("Registering {} handler for camera {}", kind, camera_id);
        self.registry.register(kind, camera_id, handler);
    }

    /// Path of the log being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Check whether the consumption loop is still running.
    pub fn is_running(&self) -> bool {
        let handle = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop following the log and wait for the loop to exit.
    ///
    /// A handler that is running when this is called finishes first.
    /// Called from inside a handler, it only signals the loop, which exits
    /// once that handler returns. Calling `stop` more than once is harmless.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        let handle = {
            let mut guard = self.handle.lock().unwrap_or_else(|p| p.into_inner());
            let on_dispatch_thread = guard
                .as_ref()
                .is_some_and(|h| h.thread().id() == thread::current().id());
            if on_dispatch_thread {
                return;
            }
            guard.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Motion dispatch loop for {} panicked", self.path.display());
            }
        }
    }
}

impl Drop for MotionDispatcher {
    fn drop(&mut self) {
        // Signal only; the loop notices within one poll interval.
        self.running.store(false, Ordering::SeqCst);
    }
}

/// State moved onto the dispatch thread.
struct DispatchLoop {
    extractor: Arc<dyn EventExtractor>,
    registry: Arc<CallbackRegistry>,
    counters: Arc<DispatchCounters>,
}

impl DispatchLoop {
    fn run<S: LineSource>(self, mut source: S) {
        let path = source.path().to_path_buf();

        match source.lines() {
            Ok(lines) => {
                for line in lines {
                    self.dispatch_line(&line);
                }
            }
            Err(e) => error!("Failed to read {}: {}", path.display(), e),
        }

        info!("Stopped watching {}", path.display());
    }

    /// Extract an event from `line` and invoke the matching handler.
    ///
    /// Returns true if a handler was invoked.
    fn dispatch_line(&self, line: &str) -> bool {
        self.counters.lines_read.fetch_add(1, Ordering::Relaxed);

        let extraction = self.extractor.extract(line);
        let Some(kind) = extraction.kind() else {
            return false;
        };
        self.counters.events_matched.fetch_add(1, Ordering::Relaxed);

        let camera_id = extraction.camera_id.as_str();
        let Some(handler) = self.registry.get(kind, camera_id) else {
            trace!("No {} handler for camera {}", kind, camera_id);
            return false;
        };

        self.counters.handlers_invoked.fetch_add(1, Ordering::Relaxed);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(camera_id, kind))) {
            self.counters.handler_faults.fetch_add(1, Ordering::Relaxed);
            error!(
                camera = camera_id,
                kind = %kind,
                "Motion handler panicked: {}",
                panic_message(payload.as_ref())
            );
        }
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
