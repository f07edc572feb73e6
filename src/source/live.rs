use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{FrameError, FrameResult};
use crate::frame::Frame;

const READER_THREAD_NAME: &str = "linecam-live-reader";

/// Where live frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveInput {
    Stdin,
    /// A file another process keeps appending to.
    Follow(PathBuf),
}

impl LiveInput {
    /// `-` selects standard input, anything else is followed as a file.
    pub fn from_arg(path: &Path) -> Self {
        if path == Path::new("-") {
            Self::Stdin
        } else {
            Self::Follow(path.to_path_buf())
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Stdin => "<stdin>".to_owned(),
            Self::Follow(path) => path.display().to_string(),
        }
    }
}

/// Held by the reader until the display can take frames.
pub struct ReadyWait(Receiver<()>);

/// Fired by the display once its surface is up.
pub struct ReadySignal(mpsc::Sender<()>);

pub fn ready_gate() -> (ReadySignal, ReadyWait) {
    let (sender, receiver) = mpsc::channel();
    (ReadySignal(sender), ReadyWait(receiver))
}

impl ReadySignal {
    pub fn signal(self) {
        let _ = self.0.send(());
    }
}

impl ReadyWait {
    /// Blocks until signalled. Returns false if the signal side was dropped
    /// without firing.
    fn wait(self) -> bool {
        self.0.recv().is_ok()
    }
}

/// UI side of the hand-off: at most one frame is ever pending.
pub struct LiveFeed {
    receiver: Receiver<Frame>,
    closed: bool,
}

impl LiveFeed {
    /// Takes the pending frame, if the reader has produced one.
    pub fn try_take(&mut self) -> Option<Frame> {
        match self.receiver.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.mark_closed();
                None
            }
        }
    }

    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Frame> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.mark_closed();
                None
            }
        }
    }

    /// True once the reader has finished and nothing is left to take.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            log::info!("live input closed");
            self.closed = true;
        }
    }
}

pub struct LiveReader {
    pub feed: LiveFeed,
    pub handle: JoinHandle<()>,
}

impl LiveReader {
    /// Starts the background reader for `input`.
    ///
    /// A follow path that cannot be opened now is a startup failure; once
    /// running, every read problem is logged and retried after
    /// `poll_interval`. `wake` runs on the reader thread after each frame is
    /// queued.
    pub fn spawn<W>(
        input: &LiveInput,
        poll_interval: Duration,
        ready: ReadyWait,
        wake: W,
    ) -> FrameResult<Self>
    where
        W: Fn() + Send + 'static,
    {
        match input {
            LiveInput::Stdin => {
                let stdin = BufReader::new(io::stdin());
                Self::from_reader(stdin, poll_interval, ready, wake)
            }
            LiveInput::Follow(path) => {
                let follower = FollowReader::open(path, poll_interval)?;
                Self::from_reader(follower, poll_interval, ready, wake)
            }
        }
    }

    /// Runs the reader over any line source. The thread ends at end of input.
    pub fn from_reader<R, W>(
        reader: R,
        retry_delay: Duration,
        ready: ReadyWait,
        wake: W,
    ) -> FrameResult<Self>
    where
        R: BufRead + Send + 'static,
        W: Fn() + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel::<Frame>(1);
        let handle = thread::Builder::new()
            .name(READER_THREAD_NAME.to_owned())
            .spawn(move || {
                if !ready.wait() {
                    log::debug!("display went away before becoming ready");
                    return;
                }
                pump_lines(reader, retry_delay, &sender, &wake);
            })
            .map_err(FrameError::Read)?;

        Ok(Self {
            feed: LiveFeed {
                receiver,
                closed: false,
            },
            handle,
        })
    }
}

fn pump_lines<R: BufRead>(
    mut reader: R,
    retry_delay: Duration,
    sender: &SyncSender<Frame>,
    wake: &dyn Fn(),
) {
    let mut frame = Frame::default();
    let mut line = Vec::new();
    let mut received = 0u64;
    let mut failures = 0u64;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                log::info!("live input reached end after {received} frame(s)");
                return;
            }
            Ok(_) => {
                if failures > 0 {
                    log::info!("live input recovered after {failures} failed read(s)");
                    failures = 0;
                }
            }
            Err(error) => {
                failures += 1;
                if failures == 1 {
                    log::warn!("live read error, retrying every {retry_delay:?}: {error}");
                } else {
                    log::debug!("live read error #{failures}: {error}");
                }
                thread::sleep(retry_delay);
                continue;
            }
        }

        frame.apply_line(&String::from_utf8_lossy(&line));
        received += 1;
        log::trace!("live frame {received} parsed");
        // Blocks while the previous frame is still waiting for the display.
        if sender.send(frame.clone()).is_err() {
            log::debug!("display closed, stopping live reader");
            return;
        }
        wake();
    }
}

/// Tails a file: end of file means "wait for more", not "done".
struct FollowReader {
    path: PathBuf,
    reader: BufReader<File>,
    position: u64,
    poll_interval: Duration,
    changes: Receiver<()>,
    _watcher: Option<RecommendedWatcher>,
}

impl FollowReader {
    fn open(path: &Path, poll_interval: Duration) -> FrameResult<Self> {
        let file = File::open(path).map_err(|source| FrameError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let (change_tx, changes) = mpsc::channel::<()>();
        let watcher = watch_for_changes(path, change_tx);
        log::info!("following {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            position: 0,
            poll_interval,
            changes,
            _watcher: watcher,
        })
    }

    fn wait_for_data(&mut self) {
        match self.changes.recv_timeout(self.poll_interval) {
            Ok(()) => while self.changes.try_recv().is_ok() {},
            Err(RecvTimeoutError::Timeout) => {}
            // Watcher gone: plain polling from here on.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(self.poll_interval),
        }

        match std::fs::metadata(&self.path) {
            Ok(metadata) if metadata.len() < self.position => {
                log::info!("{} was truncated, reading from start", self.path.display());
                self.reopen();
            }
            Ok(metadata) if !self.still_reading(&metadata) => {
                log::info!("{} was replaced, reading the new file", self.path.display());
                self.reopen();
            }
            Ok(_) => {}
            Err(error) => {
                log::warn!("{} unavailable ({error}), retrying", self.path.display());
                self.reopen();
            }
        }
    }

    fn still_reading(&self, on_disk: &std::fs::Metadata) -> bool {
        match self.reader.get_ref().metadata() {
            Ok(open) => same_file(&open, on_disk),
            Err(_) => false,
        }
    }

    fn reopen(&mut self) {
        loop {
            match File::open(&self.path) {
                Ok(file) => {
                    self.reader = BufReader::new(file);
                    self.position = 0;
                    return;
                }
                Err(error) => {
                    log::warn!(
                        "failed to reopen {} ({error}), retrying in {:?}",
                        self.path.display(),
                        self.poll_interval
                    );
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }
}

impl io::Read for FollowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.consume(count);
        Ok(count)
    }
}

impl BufRead for FollowReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.reader.fill_buf()?.is_empty() {
            self.wait_for_data();
        }
        self.reader.fill_buf()
    }

    fn consume(&mut self, amount: usize) {
        self.reader.consume(amount);
        self.position += amount as u64;
    }
}

#[cfg(unix)]
fn same_file(left: &std::fs::Metadata, right: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    left.dev() == right.dev() && left.ino() == right.ino()
}

// Without inode numbers only truncation is detected.
#[cfg(not(unix))]
fn same_file(_left: &std::fs::Metadata, _right: &std::fs::Metadata) -> bool {
    true
}

fn watch_for_changes(path: &Path, change_tx: mpsc::Sender<()>) -> Option<RecommendedWatcher> {
    let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let file_name = target.file_name().map(|name| name.to_os_string());
    let watch_root = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
        Ok(event) => {
            let targets_file = event.paths.is_empty()
                || event
                    .paths
                    .iter()
                    .any(|changed| changed.file_name() == file_name.as_deref());
            if is_data_change(&event) && targets_file {
                let _ = change_tx.send(());
            }
        }
        Err(error) => log::warn!("file watcher error: {error}"),
    });

    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(error) => {
            log::warn!("file watcher unavailable ({error}), falling back to polling");
            return None;
        }
    };
    if let Err(error) = watcher.watch(&watch_root, RecursiveMode::NonRecursive) {
        log::warn!(
            "failed to watch {} ({error}), falling back to polling",
            watch_root.display()
        );
        return None;
    }
    Some(watcher)
}

fn is_data_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any
    )
}
