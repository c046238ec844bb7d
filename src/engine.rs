//! The catch-up subscription engine.
//!
//! [`CatchUpEngine::start`] spawns one delivery worker per subscription.
//! The worker opens the live feed first (so nothing appended after start is
//! missed), drains history in batches, reconciles the tail of history
//! against the buffered live entries, then forwards live entries directly.
//!
//! Delivered positions are strictly increasing and never repeated: every
//! incoming event is checked against the checkpoint before delivery, both
//! while catching up and during the handoff drain.

use crate::error::{DropReason, ReadError, ResolutionError, Result};
use crate::live::{control_channel, Control, FeedHandle, LiveFeed, LiveQueue, LiveSink};
use crate::reader::{HistoricalReader, StoreReader};
use crate::settings::{SettingsOptions, SubscriptionSettings};
use crate::types::{EventRecord, Position, ResolvedEvent, StreamSelector};
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};

/// External collaborator that resolves link events to their targets.
///
/// Used only when `resolve_link_tos` is enabled. A resolution failure is
/// per-event and non-fatal: the unresolved link record is delivered
/// instead.
pub trait LinkResolver: Send + Sync {
    fn resolve(&self, link: &EventRecord) -> std::result::Result<EventRecord, ResolutionError>;
}

/// Outcome of the caller's event callback. An `Err` drops the
/// subscription with [`DropReason::SubscriberError`].
pub type SubscriberResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type EventCallback = Box<dyn FnMut(ResolvedEvent) -> SubscriberResult + Send>;
type LiveCallback = Box<dyn FnMut() + Send>;
type DropCallback = Box<dyn FnOnce(&DropReason) + Send>;

/// How the delivery worker finished.
enum Outcome {
    /// Caller requested stop; no drop notification.
    Stopped,
    /// Terminal failure; reported once via `on_dropped`.
    Dropped(DropReason),
}

/// Lifecycle state shared between the handle and the worker.
struct Shared {
    stop_requested: AtomicBool,
    control_tx: Sender<Control>,
    feed_handle: Mutex<Option<Box<dyn FeedHandle>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: Mutex<Option<ThreadId>>,
}

/// Handle to a running catch-up subscription.
pub struct SubscriptionHandle {
    shared: Arc<Shared>,
}

impl SubscriptionHandle {
    /// Request a stop and wait for the worker to finish.
    ///
    /// Idempotent and safe to call from any thread, including from inside
    /// the event callback. Once `stop` returns (from another thread), no
    /// further callbacks run and the live feed is unsubscribed. A stopped
    /// subscription produces no `on_dropped` notification.
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        let _ = self.shared.control_tx.send(Control::Stop);

        // Called from within the worker's own callback: the worker is
        // already on its way out; joining here would deadlock.
        let self_stop = *self.shared.worker_thread.lock() == Some(thread::current().id());
        if self_stop {
            return;
        }

        let mut worker = self.shared.worker.lock();
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }
    }
}

/// Orchestrates historical reads and the live feed into one ordered,
/// deduplicated delivery stream.
pub struct CatchUpEngine {
    store: Arc<dyn StoreReader>,
    feed: Arc<dyn LiveFeed>,
    resolver: Option<Arc<dyn LinkResolver>>,
}

impl CatchUpEngine {
    pub fn new(store: Arc<dyn StoreReader>, feed: Arc<dyn LiveFeed>) -> Self {
        Self {
            store,
            feed,
            resolver: None,
        }
    }

    /// Attach a link resolver, used when `resolve_link_tos` is enabled.
    pub fn with_link_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Start a catch-up subscription.
    ///
    /// Delivery begins strictly after `from` (`None` = the beginning of
    /// the stream). Configuration errors are returned synchronously; every
    /// later failure arrives through `on_dropped`, exactly once.
    ///
    /// Callback ordering is sequential: all historical events in position
    /// order, then `on_live_processing_started`, then live events in
    /// position order.
    pub fn start(
        &self,
        selector: StreamSelector,
        from: Option<Position>,
        options: SettingsOptions,
        on_event: impl FnMut(ResolvedEvent) -> SubscriberResult + Send + 'static,
        on_live_processing_started: impl FnMut() + Send + 'static,
        on_dropped: impl FnOnce(&DropReason) + Send + 'static,
    ) -> Result<SubscriptionHandle> {
        let settings = SubscriptionSettings::from_options(options)?;

        let queue = LiveQueue::bounded(settings.max_live_queue_size());
        let (control_tx, control_rx) = control_channel();

        let shared = Arc::new(Shared {
            stop_requested: AtomicBool::new(false),
            control_tx,
            feed_handle: Mutex::new(None),
            worker: Mutex::new(None),
            worker_thread: Mutex::new(None),
        });

        let reader = HistoricalReader::new(
            self.store.clone(),
            selector.clone(),
            settings.read_batch_size(),
            settings.max_search_window(),
        );

        let worker = Worker {
            feed: self.feed.clone(),
            resolver: self.resolver.clone(),
            selector,
            settings,
            reader,
            queue,
            control_rx,
            shared: shared.clone(),
            checkpoint: from,
            on_event: Box::new(on_event),
            on_live: Box::new(on_live_processing_started),
        };

        let join = thread::Builder::new()
            .name("catchup-subscription".to_string())
            .spawn(move || worker.run(Box::new(on_dropped)))?;

        *shared.worker_thread.lock() = Some(join.thread().id());
        *shared.worker.lock() = Some(join);

        Ok(SubscriptionHandle { shared })
    }
}

/// Per-subscription delivery worker. Owns the checkpoint: the single
/// writer that advances it.
struct Worker {
    feed: Arc<dyn LiveFeed>,
    resolver: Option<Arc<dyn LinkResolver>>,
    selector: StreamSelector,
    settings: SubscriptionSettings,
    reader: HistoricalReader,
    queue: LiveQueue,
    control_rx: Receiver<Control>,
    shared: Arc<Shared>,
    /// Last position delivered or consumed; `None` until the first one.
    checkpoint: Option<Position>,
    on_event: EventCallback,
    on_live: LiveCallback,
}

impl Worker {
    fn run(mut self, on_dropped: DropCallback) {
        let outcome = self.run_inner();

        // Unsubscribe on every exit path; unsubscribe is idempotent.
        if let Some(handle) = self.shared.feed_handle.lock().take() {
            handle.unsubscribe();
        }

        match outcome {
            Outcome::Stopped => {
                debug!(stream = %self.selector, "subscription stopped");
            }
            Outcome::Dropped(reason) => {
                warn!(stream = %self.selector, reason = ?reason, "subscription dropped");
                if !self.shared.stop_requested.load(Ordering::SeqCst) {
                    on_dropped(&reason);
                }
            }
        }
    }

    fn run_inner(&mut self) -> Outcome {
        // Open the live feed before touching history, so that every event
        // appended from now on lands in the queue.
        let sink = LiveSink::new(&self.queue, self.shared.control_tx.clone());
        match self.feed.subscribe(&self.selector, sink) {
            Ok(handle) => {
                *self.shared.feed_handle.lock() = Some(handle);
            }
            Err(e) => {
                warn!(stream = %self.selector, "live feed subscribe failed: {}", e);
                return Outcome::Dropped(DropReason::ConnectionLost);
            }
        }

        if let Some(outcome) = self.catch_up() {
            return outcome;
        }

        if let Some(outcome) = self.hand_off() {
            return outcome;
        }

        self.live()
    }

    /// CatchingUp: drain history from the read cursor until the store
    /// reports the head.
    fn catch_up(&mut self) -> Option<Outcome> {
        let mut cursor = self.checkpoint.map_or(Position(0), Position::next);
        loop {
            if let Some(outcome) = self.poll_control() {
                return Some(outcome);
            }

            let batch = match self.reader.next_batch(cursor) {
                Ok(batch) => batch,
                Err(ReadError::Fatal(msg)) | Err(ReadError::Transient(msg)) => {
                    return Some(Outcome::Dropped(DropReason::ReadFailure(msg)));
                }
            };

            for (position, record) in batch.events {
                if let Some(outcome) = self.poll_control() {
                    return Some(outcome);
                }
                if self.superseded(position) {
                    continue;
                }
                if let Err(outcome) = self.deliver(position, record) {
                    return Some(outcome);
                }
            }

            cursor = batch.next_position;
            if batch.end_reached {
                return None;
            }
        }
    }

    /// Handoff: deliver buffered live entries not already covered by
    /// history, then announce live processing.
    fn hand_off(&mut self) -> Option<Outcome> {
        let buffered = self.queue.drain();
        debug!(
            stream = %self.selector,
            checkpoint = ?self.checkpoint,
            buffered = buffered.len(),
            "history drained, reconciling live buffer"
        );

        for (position, record) in buffered {
            if let Some(outcome) = self.poll_control() {
                return Some(outcome);
            }
            if self.superseded(position) {
                continue;
            }
            if let Err(outcome) = self.deliver(position, record) {
                return Some(outcome);
            }
        }

        if self.shared.stop_requested.load(Ordering::SeqCst) {
            return Some(Outcome::Stopped);
        }
        (self.on_live)();
        None
    }

    /// Live: forward queue entries as they arrive. The blocking select is
    /// the worker's one suspension point.
    fn live(&mut self) -> Outcome {
        let control_rx = self.control_rx.clone();
        let queue_rx = self.queue.receiver().clone();
        loop {
            if let Some(outcome) = self.poll_control() {
                return outcome;
            }

            select! {
                recv(control_rx) -> msg => match msg {
                    Ok(Control::Stop) | Err(_) => return Outcome::Stopped,
                    Ok(Control::Overflow) => {
                        return Outcome::Dropped(DropReason::QueueOverflow);
                    }
                    Ok(Control::FeedClosed) => {
                        return Outcome::Dropped(DropReason::ConnectionLost);
                    }
                },
                recv(queue_rx) -> entry => {
                    if let Ok((position, record)) = entry {
                        if !self.superseded(position) {
                            if let Err(outcome) = self.deliver(position, record) {
                                return outcome;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Non-blocking check for stop/overflow/feed-closed signals.
    fn poll_control(&self) -> Option<Outcome> {
        if self.shared.stop_requested.load(Ordering::SeqCst) {
            return Some(Outcome::Stopped);
        }
        match self.control_rx.try_recv() {
            Ok(Control::Stop) => Some(Outcome::Stopped),
            Ok(Control::Overflow) => Some(Outcome::Dropped(DropReason::QueueOverflow)),
            Ok(Control::FeedClosed) => Some(Outcome::Dropped(DropReason::ConnectionLost)),
            Err(_) => None,
        }
    }

    /// Whether a position is already covered by the checkpoint.
    fn superseded(&self, position: Position) -> bool {
        self.checkpoint.is_some_and(|c| position <= c)
    }

    /// Resolve, filter, invoke the caller, advance the checkpoint.
    ///
    /// Filtered-out positions are consumed without a callback. The
    /// checkpoint only advances past a passing event once its callback
    /// returned successfully.
    fn deliver(&mut self, position: Position, record: EventRecord) -> std::result::Result<(), Outcome> {
        let resolved = self.resolve(record);

        if !self.settings.filter().passes(resolved.record()) {
            self.checkpoint = Some(position);
            return Ok(());
        }

        if self.shared.stop_requested.load(Ordering::SeqCst) {
            return Err(Outcome::Stopped);
        }

        match (self.on_event)(resolved) {
            Ok(()) => {
                self.checkpoint = Some(position);
                Ok(())
            }
            Err(e) => Err(Outcome::Dropped(DropReason::SubscriberError(e.to_string()))),
        }
    }

    fn resolve(&self, record: EventRecord) -> ResolvedEvent {
        if self.settings.resolve_link_tos() && record.is_link() {
            if let Some(resolver) = &self.resolver {
                match resolver.resolve(&record) {
                    Ok(target) => return ResolvedEvent::resolved(record, target),
                    Err(e) => {
                        warn!(
                            stream = %self.selector,
                            event = record.event_number,
                            "link resolution failed, delivering unresolved: {}",
                            e
                        );
                    }
                }
            }
        }
        ResolvedEvent::unresolved(record)
    }
}
