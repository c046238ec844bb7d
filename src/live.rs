//! Live feed buffering.
//!
//! While catch-up is in progress the live feed pushes into a bounded
//! [`LiveQueue`] on its own notification thread. The push never blocks:
//! the upstream feed offers no flow control, so a full queue is an
//! overflow signal that drops the subscription instead of backpressure.

use crate::error::FeedError;
use crate::types::{EventRecord, Position, StreamSelector};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

/// One buffered live event: the position it was appended at, plus the
/// raw record. Resolution and filtering happen at delivery time.
pub type LiveEntry = (Position, EventRecord);

/// Out-of-band signals observed by the delivery worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Control {
    /// Caller requested stop.
    Stop,
    /// Live queue exceeded capacity.
    Overflow,
    /// Live feed closed unexpectedly.
    FeedClosed,
}

/// The queue was at capacity; the subscription must be dropped.
#[derive(Debug)]
pub struct QueueFull;

/// Bounded, ordered buffer between the live feed thread and the delivery
/// worker.
pub struct LiveQueue {
    tx: Sender<LiveEntry>,
    rx: Receiver<LiveEntry>,
}

impl LiveQueue {
    /// A queue holding at most `capacity` entries.
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Append an entry without blocking. A full queue is an error, never
    /// a wait.
    pub fn push(&self, entry: LiveEntry) -> Result<(), QueueFull> {
        match self.tx.try_send(entry) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(QueueFull),
            // Consumer gone; the subscription is already shutting down.
            Err(TrySendError::Disconnected(_)) => Ok(()),
        }
    }

    /// Remove and return everything currently buffered, in arrival order.
    /// Used during the catch-up to live handoff.
    pub fn drain(&self) -> Vec<LiveEntry> {
        self.rx.try_iter().collect()
    }

    /// Remove and return the oldest entry, blocking while the queue is
    /// empty.
    pub fn pop(&self) -> LiveEntry {
        self.rx.recv().expect("live queue owns a sender")
    }

    /// The consuming end, for the delivery worker's cancellable wait.
    pub(crate) fn receiver(&self) -> &Receiver<LiveEntry> {
        &self.rx
    }

    /// A producer handle for the feed sink.
    pub(crate) fn sender(&self) -> Sender<LiveEntry> {
        self.tx.clone()
    }

    /// Entries currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Hard capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity().expect("live queue is bounded")
    }
}

/// Sink handed to the live feed collaborator. The feed calls
/// [`LiveSink::publish`] from its own notification thread for every newly
/// appended event; neither call ever blocks.
pub struct LiveSink {
    queue_tx: Sender<LiveEntry>,
    control_tx: Sender<Control>,
}

impl LiveSink {
    pub(crate) fn new(queue: &LiveQueue, control_tx: Sender<Control>) -> Self {
        Self {
            queue_tx: queue.sender(),
            control_tx,
        }
    }

    /// Push a newly appended event into the live queue.
    ///
    /// On overflow the subscription is flagged for dropping; the entry is
    /// discarded.
    pub fn publish(&self, position: Position, record: EventRecord) {
        match self.queue_tx.try_send((position, record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(position = %position, "live queue overflow");
                let _ = self.control_tx.send(Control::Overflow);
            }
            Err(TrySendError::Disconnected(_)) => {
                // Worker already gone; nothing to deliver to.
            }
        }
    }

    /// Report that the feed closed unexpectedly. Not called on a clean
    /// unsubscribe.
    pub fn closed(&self) {
        debug!("live feed reported closure");
        let _ = self.control_tx.send(Control::FeedClosed);
    }
}

/// Handle to an open live feed subscription. `unsubscribe` is idempotent.
pub trait FeedHandle: Send {
    fn unsubscribe(&self);
}

/// External collaborator that pushes newly appended events.
pub trait LiveFeed: Send + Sync {
    /// Open a push subscription, registering `sink` as the destination for
    /// every event appended from now on.
    fn subscribe(
        &self,
        selector: &StreamSelector,
        sink: LiveSink,
    ) -> Result<Box<dyn FeedHandle>, FeedError>;
}

pub(crate) fn control_channel() -> (Sender<Control>, Receiver<Control>) {
    unbounded()
}
