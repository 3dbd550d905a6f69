use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-shot, broadcast cancellation signal shared by every stage worker.
///
/// The token owns the only sender of a channel that never carries a message.
/// Cancelling drops that sender, which disconnects the channel and wakes every
/// `select!` currently waiting on [`CancellationToken::signal`], as well as any
/// that start waiting later.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    fired: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl CancellationToken {
    /// Create a token that has not fired yet
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                fired: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// Fire the signal. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.inner.fired.store(true, Ordering::Release);
        if self.inner.trigger.lock().take().is_some() {
            tracing::debug!("cancellation fired");
        }
    }

    /// Whether the signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled.
    /// Meant to be used as a `recv` arm of `crossbeam::select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Block the calling thread until the token is cancelled
    pub fn wait(&self) {
        // Nothing is ever sent, so this only returns on disconnect.
        let _ = self.inner.signal.recv();
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
