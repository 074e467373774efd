//! Background listener threads and their stop signal.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error};

use super::config::BackoffStrategy;

/// Longest single wait on the socket before the stop signal is checked.
pub(crate) const POLL_SLICE: Duration = Duration::from_millis(50);

/// Receiving side of a stop signal.
///
/// The signal fires when the owning [`Worker`] drops its sender.
#[derive(Debug)]
pub(crate) struct StopToken {
    rx: mpsc::Receiver<()>,
}

impl StopToken {
    /// Create a token together with the sender whose drop fires it.
    pub(crate) fn new() -> (Sender<()>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    /// Check whether a stop has been requested.
    pub(crate) fn is_stopped(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleep for `duration` unless stopped first. Returns true if stopped.
    pub(crate) fn wait(&self, duration: Duration) -> bool {
        !matches!(self.rx.recv_timeout(duration), Err(RecvTimeoutError::Timeout))
    }
}

/// A running listener thread.
#[derive(Debug)]
pub(crate) struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawn a named thread running `body` until its token fires.
    pub(crate) fn spawn<F>(name: String, body: F) -> io::Result<Self>
    where
        F: FnOnce(StopToken) + Send + 'static,
    {
        let (stop, token) = StopToken::new();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(token))?;
        debug!("started listener thread {name}");
        Ok(Self { stop, handle })
    }

    /// Signal the thread and wait for it to exit.
    pub(crate) fn stop(self) {
        let Worker { stop, handle } = self;
        drop(stop);

        let name = handle.thread().name().unwrap_or("listener").to_string();
        if handle.join().is_err() {
            error!("listener thread {name} panicked");
        } else {
            debug!("joined listener thread {name}");
        }
    }
}

/// Consecutive-error tracker for listening loops.
#[derive(Debug)]
pub(crate) struct ErrorBackoff {
    strategy: BackoffStrategy,
    failures: u32,
}

impl ErrorBackoff {
    pub(crate) fn new(strategy: BackoffStrategy) -> Self {
        Self {
            strategy,
            failures: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.failures = 0;
    }

    /// Wait out the delay for the current failure streak. Returns true if stopped.
    pub(crate) fn wait(&mut self, stop: &StopToken) -> bool {
        let delay = self.strategy.delay_for_attempt(self.failures);
        self.failures = self.failures.saturating_add(1);
        if delay.is_zero() {
            return stop.is_stopped();
        }
        stop.wait(delay)
    }
}
