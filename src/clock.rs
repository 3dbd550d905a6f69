use crossbeam::channel::{bounded, tick, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of periodic ticks for time-driven stages.
pub trait Clock: Send + Sync + 'static {
    /// Return a receiver that yields one message per tick of the given period
    fn ticker(&self, period: Duration) -> Receiver<Instant>;
}

/// Wall-clock ticks backed by `crossbeam::channel::tick`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn ticker(&self, period: Duration) -> Receiver<Instant> {
        tick(period)
    }
}

/// A clock that only ticks when told to.
///
/// Every ticker handed out is a rendezvous channel, so [`ManualClock::tick`]
/// returns only after each live subscriber has taken the tick. The requested
/// period is ignored.
#[derive(Clone, Default)]
pub struct ManualClock {
    subscribers: Arc<Mutex<Vec<Sender<Instant>>>>,
}

impl ManualClock {
    /// Create a clock with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one tick to every subscriber, blocking until each has taken it.
    ///
    /// Subscribers whose receiving side was dropped are forgotten. Returns the
    /// number of subscribers that observed the tick.
    pub fn tick(&self) -> usize {
        // Send outside the lock so new subscribers can register meanwhile.
        let subscribers: Vec<_> = self.subscribers.lock().clone();
        let now = Instant::now();
        let mut delivered = 0;
        let mut closed = Vec::new();
        for tx in subscribers {
            match tx.send(now) {
                Ok(()) => delivered += 1,
                Err(_) => closed.push(tx),
            }
        }
        if !closed.is_empty() {
            self.subscribers
                .lock()
                .retain(|tx| !closed.iter().any(|c| c.same_channel(tx)));
        }
        delivered
    }

    /// Number of tickers handed out that may still be listening
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Clock for ManualClock {
    fn ticker(&self, _period: Duration) -> Receiver<Instant> {
        let (tx, rx) = bounded(0);
        self.subscribers.lock().push(tx);
        rx
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
