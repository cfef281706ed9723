//! Console-based event reporter.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::domain::{EventKind, MotionEvent};
use crate::reporter::EventReporter;

/// Reports motion events to the console.
///
/// Formats events in a human-readable format suitable for
/// terminal output.
pub struct ConsoleReporter {
    /// Camera ID to display label
    labels: BTreeMap<String, String>,
    /// Whether to show verbose output
    verbose: bool,
}

impl ConsoleReporter {
    /// Create a new console reporter.
    pub fn new() -> Self {
        Self {
            labels: BTreeMap::new(),
            verbose: false,
        }
    }

    /// Show `label` next to events from `camera_id`.
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Enable or disable verbose output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn format_event(&self, event: &MotionEvent) -> String {
        let mut output = match event.kind {
            EventKind::Start => format!("[MOTION START] Camera: {}", event.camera_id),
            EventKind::Stop => format!("[MOTION STOP]  Camera: {}", event.camera_id),
        };

        if let Some(label) = self.labels.get(&event.camera_id).filter(|l| !l.is_empty()) {
            output.push_str(&format!(" ({})", label));
        }

        if self.verbose {
            let unix = event
                .timestamp
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or(Duration::ZERO);
            output.push_str(&format!(" | At: {:.3}", unix.as_secs_f64()));
        }

        output
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventReporter for ConsoleReporter {
    fn report(&self, event: &MotionEvent) {
        let output = self.format_event(event);
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", output);
    }

    fn on_start(&self, log_path: &Path, cameras: &[String]) {
        println!("Watching {} for motion on: {}", log_path.display(), cameras.join(", "));
        println!("Press Ctrl+C to stop.\n");
    }

    fn on_stop(&self) {
        println!("\nStopping motion watcher.");
    }
}
