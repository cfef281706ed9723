//! File follower woken by filesystem events.

use std::fs::{self, File, Metadata};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace};

use super::LineSource;
use crate::error::SourceError;

/// Longest wait at end of file before checking for new data when no
/// filesystem event arrives.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Identity of an open file, used to notice the path being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Follows a log file from a byte offset, like `tail -F`.
///
/// At end of file the path is re-examined: if it now names a different
/// file (rotation) or the file shrank below the read position
/// (truncation), the path is reopened and reading restarts at offset 0.
/// A path that is briefly missing during rotation is simply polled again.
///
/// Waiting at end of file is driven by a `notify` watcher on the parent
/// directory, with the poll interval as a fallback when no event arrives
/// or the watcher could not be created.
pub struct FileTail {
    path: PathBuf,
    reader: BufReader<File>,
    /// Byte offset of the next unread byte in the current file.
    position: u64,
    identity: Option<FileIdentity>,
    /// Bytes of a line whose newline has not been written yet.
    pending: Vec<u8>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    /// Wakeups from the filesystem watcher.
    wake_rx: Option<Receiver<()>>,
    /// Must stay alive for `wake_rx` to receive anything.
    _watcher: Option<RecommendedWatcher>,
}

impl FileTail {
    /// Open `path` and position the reader at `offset`.
    ///
    /// Fails immediately if the file does not exist or cannot be read.
    pub fn open(path: impl AsRef<Path>, offset: u64) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| source_error(&path, e))?;
        let identity = file
            .metadata()
            .map(|m| FileIdentity::of(&m))
            .map_err(|e| source_error(&path, e))?;

        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| source_error(&path, e))?;

        let (wake_tx, wake_rx) = mpsc::sync_channel(1);
        let watcher = setup_notify_watcher(&path, wake_tx);
        let wake_rx = watcher.as_ref().map(|_| wake_rx);

        Ok(Self {
            path,
            reader,
            position: offset,
            identity,
            pending: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            running: Arc::new(AtomicBool::new(true)),
            wake_rx,
            _watcher: watcher,
        })
    }

    /// Open `path` positioned at its current end, so only lines appended
    /// from now on are yielded.
    pub fn at_end(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| source_error(path, e))?;
        Self::open(path, metadata.len())
    }

    /// Set the longest wait at end of file between checks.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Block until the next complete line is available.
    ///
    /// Returns `None` once the running flag is cleared.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return None;
            }

            match self.reader.read_until(b'\n', &mut self.pending) {
                Ok(0) => {
                    if self.reopen_if_replaced() {
                        // Whatever was left unterminated in the old file is
                        // as complete as it will ever get.
                        if !self.pending.is_empty() {
                            return Some(take_line(&mut self.pending));
                        }
                        continue;
                    }
                    self.wait_for_change();
                }
                Ok(n) => {
                    self.position += n as u64;
                    if self.pending.last() == Some(&b'\n') {
                        return Some(take_line(&mut self.pending));
                    }
                    // Partial line, wait for the producer to finish it
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Read error on {}: {}", self.path.display(), e);
                    self.wait_for_change();
                }
            }
        }
    }

    /// Block until the watcher reports activity or the poll interval
    /// elapses, whichever comes first.
    fn wait_for_change(&mut self) {
        let Some(wake_rx) = &self.wake_rx else {
            thread::sleep(self.poll_interval);
            return;
        };

        match wake_rx.recv_timeout(self.poll_interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                debug!("File watcher for {} went away, polling", self.path.display());
                self.wake_rx = None;
            }
        }
    }

    /// Reopen the path if it was rotated or truncated.
    ///
    /// Returns true when the reader now points at the start of a new file.
    fn reopen_if_replaced(&mut self) -> bool {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) => {
                trace!("Cannot stat {}: {}", self.path.display(), e);
                return false;
            }
        };

        let identity = FileIdentity::of(&metadata);
        let replaced = identity.is_some() && identity != self.identity;
        // A file truncated and then refilled past the old position
        // between two checks is not caught here; reading resumes at the
        // old offset of the new content.
        let truncated = metadata.len() < self.position;

        if !replaced && !truncated {
            return false;
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                debug!("Failed to reopen {}: {}", self.path.display(), e);
                return false;
            }
        };

        if replaced {
            info!("Log file {} was replaced, following new file", self.path.display());
        } else {
            info!("Log file {} was truncated, reading from start", self.path.display());
        }

        self.identity = file
            .metadata()
            .map(|m| FileIdentity::of(&m))
            .unwrap_or(identity);
        self.reader = BufReader::new(file);
        self.position = 0;
        true
    }
}

impl LineSource for FileTail {
    fn lines(&mut self) -> Result<Box<dyn Iterator<Item = String> + '_>, SourceError> {
        Ok(Box::new(TailLines { tail: self }))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_running(&mut self, running: Arc<AtomicBool>) {
        self.running = running;
    }
}

/// Iterator over lines of a `FileTail`.
struct TailLines<'a> {
    tail: &'a mut FileTail,
}

impl Iterator for TailLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.tail.next_line()
    }
}

/// Drain `buf` into a string without its line terminator.
fn take_line(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    line
}

/// Watch the directory holding `path` so rotation and creation are seen
/// as well as appends. Returns `None` if the platform watcher fails, in
/// which case the follower only polls.
fn setup_notify_watcher(path: &Path, wake_tx: SyncSender<()>) -> Option<RecommendedWatcher> {
    let mut watcher = match notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
        // A wakeup already queued covers this event too
        let _ = wake_tx.try_send(());
    }) {
        Ok(w) => w,
        Err(e) => {
            debug!("Cannot create file watcher: {}", e);
            return None;
        }
    };

    let watch_path = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if let Err(e) = watcher.watch(watch_path, RecursiveMode::NonRecursive) {
        debug!("Cannot watch {}: {}", watch_path.display(), e);
        return None;
    }

    Some(watcher)
}

fn source_error(path: &Path, err: io::Error) -> SourceError {
    if err.kind() == io::ErrorKind::NotFound {
        SourceError::NotFound(path.to_path_buf())
    } else {
        SourceError::Io {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::mpsc;
    use tempfile::TempDir;

    const POLL: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(5);

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    /// Follow `tail` on a background thread, forwarding lines to a channel.
    fn follow(mut tail: FileTail) -> (mpsc::Receiver<String>, Arc<AtomicBool>) {
        let running = Arc::new(AtomicBool::new(true));
        tail.set_running(running.clone());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in tail.lines().unwrap() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        (rx, running)
    }

    #[test]
    fn test_open_missing_file_is_not_found() {
        let result = FileTail::open("/Non/existent/file/should/fail", 0);
        assert!(matches!(result, Err(SourceError::NotFound(_))));

        let result = FileTail::at_end("/Non/existent/file/should/fail");
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_at_end_skips_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, "old line 1\nold line 2\n").unwrap();

        let tail = FileTail::at_end(&path).unwrap().with_poll_interval(POLL);

        let (rx, running) = follow(tail);
        append(&path, "new line\n");

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "new line");
        running.store(false, Ordering::SeqCst);
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn test_append_wakes_follower_before_poll_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, "").unwrap();

        // Far longer than the wait below, so only a watcher event can
        // deliver the line in time.
        let tail = FileTail::at_end(&path)
            .unwrap()
            .with_poll_interval(Duration::from_secs(60));
        assert!(tail.wake_rx.is_some());

        let (rx, running) = follow(tail);
        thread::sleep(Duration::from_millis(50));
        append(&path, "Camera[A] type:start event:1\n");

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "Camera[A] type:start event:1");
        running.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_open_at_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, "first\nsecond\n").unwrap();

        let mut tail = FileTail::open(&path, 6).unwrap().with_poll_interval(POLL);
        assert_eq!(tail.next_line().as_deref(), Some("second"));
    }

    #[test]
    fn test_partial_line_is_buffered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, "").unwrap();

        let tail = FileTail::at_end(&path).unwrap().with_poll_interval(POLL);
        let (rx, running) = follow(tail);

        append(&path, "Camera[A] ty");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        append(&path, "pe:start \r\n");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "Camera[A] type:start ");
        running.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_follows_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, "some history that is long enough\n").unwrap();

        let tail = FileTail::at_end(&path).unwrap().with_poll_interval(POLL);
        let (rx, running) = follow(tail);

        fs::write(&path, "after\n").unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "after");

        append(&path, "more\n");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "more");
        running.store(false, Ordering::SeqCst);
    }

    #[cfg(unix)]
    #[test]
    fn test_follows_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, "history\n").unwrap();

        let tail = FileTail::at_end(&path).unwrap().with_poll_interval(POLL);
        let (rx, running) = follow(tail);

        append(&path, "before rotation\n");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "before rotation");

        fs::rename(&path, dir.path().join("motion.log.1")).unwrap();
        fs::write(&path, "").unwrap();
        append(&path, "after rotation\n");

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "after rotation");
        running.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_stops_when_running_cleared() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, "").unwrap();

        let mut tail = FileTail::at_end(&path).unwrap().with_poll_interval(POLL);
        let running = Arc::new(AtomicBool::new(true));
        tail.set_running(running.clone());

        let handle = thread::spawn(move || tail.lines().unwrap().count());
        running.store(false, Ordering::SeqCst);

        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion.log");
        fs::write(&path, b"cam\xff\n").unwrap();

        let mut tail = FileTail::open(&path, 0).unwrap();
        assert_eq!(tail.next_line().as_deref(), Some("cam\u{fffd}"));
    }

    #[test]
    fn test_take_line_strips_terminators() {
        let mut buf = b"hello\r\n".to_vec();
        assert_eq!(take_line(&mut buf), "hello");
        assert!(buf.is_empty());

        let mut buf = b"no newline".to_vec();
        assert_eq!(take_line(&mut buf), "no newline");
    }
}
