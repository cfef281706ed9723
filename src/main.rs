//! motionwatch - print camera motion events as they are logged.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use motionwatch::{Config, ConsoleReporter, EventReporter, MotionDispatcher, MotionEvent};

const LOOP_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "motionwatch")]
#[command(about = "Report camera motion start/stop events from an NVR log")]
struct Cli {
    /// Config file (default: $MOTIONWATCH_CONFIG or /etc/motionwatch.conf)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Motion log to follow
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Camera ID to watch (repeatable)
    #[arg(long = "camera", value_name = "ID")]
    cameras: Vec<String>,

    /// Extraction regex: group 1 is the camera ID, group 2 the event type
    #[arg(long)]
    pattern: Option<String>,

    /// Milliseconds to wait at end of file before polling again
    #[arg(long, value_name = "MS")]
    poll_ms: Option<u64>,

    /// Show event times
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(log) = cli.log {
        config.log_path = Some(log);
    }
    if let Some(pattern) = cli.pattern {
        config.pattern = pattern;
    }
    if let Some(ms) = cli.poll_ms {
        if ms == 0 {
            bail!("--poll-ms must be greater than zero");
        }
        config.poll_interval = Duration::from_millis(ms);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.tracing_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut cameras: Vec<String> = config.cameras.keys().cloned().collect();
    for camera in cli.cameras {
        if !cameras.contains(&camera) {
            cameras.push(camera);
        }
    }
    if cameras.is_empty() {
        bail!("no cameras to watch; pass --camera or add camera.<ID> entries to the config");
    }

    let dispatcher = MotionDispatcher::from_config(&config).context("Failed to start watching")?;

    let reporter: Arc<dyn EventReporter> = Arc::new(
        ConsoleReporter::new()
            .with_labels(config.cameras.clone())
            .with_verbose(cli.verbose),
    );

    for camera in &cameras {
        let on_start = reporter.clone();
        dispatcher.register_start(camera.as_str(), move |camera, kind| {
            on_start.report(&MotionEvent::new(camera, kind));
        });
        let on_stop = reporter.clone();
        dispatcher.register_stop(camera.as_str(), move |camera, kind| {
            on_stop.report(&MotionEvent::new(camera, kind));
        });
    }

    reporter.on_start(dispatcher.path(), &cameras);

    // Set up Ctrl+C / SIGTERM handler
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("Failed to set Ctrl+C handler")?;

    // Wake periodically in case the dispatch loop ends on its own
    loop {
        match shutdown_rx.recv_timeout(LOOP_CHECK_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) if !dispatcher.is_running() => {
                tracing::warn!("Dispatch loop ended unexpectedly");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    dispatcher.stop();
    reporter.on_stop();

    let stats = dispatcher.stats();
    tracing::info!(
        lines = stats.lines_read,
        events = stats.events_matched,
        dispatched = stats.handlers_invoked,
        faults = stats.handler_faults,
        "Motion watcher stopped"
    );

    Ok(())
}
