//! Background flush worker.
//!
//! One thread per log writes cached pages to segment files. It wakes up on
//! an explicit flush, on a nudge from an append that pushed the cache over
//! its limit, or every `commit_delay`. Background passes fsync at most once
//! per `fsync_interval`, and only when `call_fsync` is set; explicit flushes
//! always fsync.

use crate::error::{CoreError, CoreResult};
use crate::wal::log::Shared;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shortest wait between background passes.
const MIN_COMMIT_DELAY: Duration = Duration::from_millis(1);

enum Command {
    Flush(Sender<CoreResult<()>>),
    Nudge,
    Shutdown {
        flush: bool,
        reply: Sender<CoreResult<()>>,
    },
}

/// Handle to the flush thread.
///
/// Only the join handle sits behind a lock; sending never waits on another
/// caller's flush.
#[derive(Debug)]
pub(crate) struct FlushWorker {
    commands: Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FlushWorker {
    /// Starts the flush thread for `shared`.
    pub(crate) fn spawn(shared: Arc<Shared>) -> CoreResult<Self> {
        let (commands, rx) = mpsc::channel();
        let name = format!("segwal-flush-{}", shared.config().name);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || run(&shared, &rx))?;
        Ok(Self {
            commands,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Runs a synchronous flush pass and waits for it.
    pub(crate) fn flush(&self) -> CoreResult<()> {
        let (reply, done) = mpsc::channel();
        self.commands
            .send(Command::Flush(reply))
            .map_err(|_| CoreError::flush_failed("flush worker stopped"))?;
        done.recv()
            .map_err(|_| CoreError::flush_failed("flush worker stopped"))?
    }

    /// Asks for a background pass without waiting.
    pub(crate) fn nudge(&self) {
        let _ = self.commands.send(Command::Nudge);
    }

    /// Stops the thread, optionally after a final synchronous pass.
    pub(crate) fn shutdown(&self, flush: bool) -> CoreResult<()> {
        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };
        let (reply, done) = mpsc::channel();
        let result = match self.commands.send(Command::Shutdown { flush, reply }) {
            Ok(()) => done
                .recv()
                .unwrap_or_else(|_| Err(CoreError::flush_failed("flush worker stopped"))),
            Err(_) => Err(CoreError::flush_failed("flush worker stopped")),
        };
        if handle.join().is_err() {
            return Err(CoreError::flush_failed("flush worker panicked"));
        }
        result
    }
}

fn run(shared: &Shared, commands: &Receiver<Command>) {
    let config = shared.config();
    let delay = config.commit_delay.max(MIN_COMMIT_DELAY);
    let mut last_sync = Instant::now();
    let mut last_stats = Instant::now();

    loop {
        let mut written = 0;
        match commands.recv_timeout(delay) {
            Ok(Command::Flush(reply)) => {
                let result = shared.flush_pass(true);
                if let Ok(pages) = &result {
                    last_sync = Instant::now();
                    written = *pages;
                }
                let _ = reply.send(result.map(|_| ()));
            }
            Ok(Command::Nudge) | Err(RecvTimeoutError::Timeout) => {
                let sync = config.call_fsync && last_sync.elapsed() >= config.fsync_interval;
                match shared.flush_pass(sync) {
                    Ok(pages) => {
                        if sync {
                            last_sync = Instant::now();
                        }
                        written = pages;
                    }
                    Err(err) => tracing::error!(error = %err, "background flush failed"),
                }
            }
            Ok(Command::Shutdown { flush, reply }) => {
                let result = if flush { shared.flush_pass(true).map(|_| ()) } else { Ok(()) };
                let _ = reply.send(result);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if written > 0 {
            shared.check_thresholds();
        }

        if config.print_performance_statistics
            && last_stats.elapsed() >= config.statistics_print_interval
        {
            shared.print_statistics();
            last_stats = Instant::now();
        }
    }
    tracing::debug!(log = %config.name, "flush worker stopped");
}
