//! In-memory collaborator mocks shared by the integration tests.

#![allow(dead_code)]

use catchup::{
    DropReason, EventId, EventRecord, FeedError, FeedHandle, LinkResolver, LiveFeed, LiveSink,
    Position, ReadBatch, ReadError, ResolutionError, ResolvedEvent, StoreReader, StreamSelector,
    SubscriberResult, Timestamp, LINK_EVENT_TYPE,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(2);

pub fn make_record(n: u64, event_type: &str) -> EventRecord {
    EventRecord {
        stream_id: "orders".to_string(),
        event_id: EventId::from_u128(n as u128),
        event_number: n,
        event_type: event_type.to_string(),
        data: serde_json::to_vec(&serde_json::json!({ "n": n })).unwrap(),
        metadata: Vec::new(),
        is_json: true,
        created: Some(Timestamp::now()),
    }
}

pub fn link_record(n: u64) -> EventRecord {
    make_record(n, LINK_EVENT_TYPE)
}

// --- Store reader mock ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadCall {
    pub from: Position,
    pub batch_size: usize,
    pub search_window: Option<usize>,
}

pub enum StoreMode {
    /// Serve the fixed history, then report the end.
    Normal,
    /// Fail every read fatally.
    FailFatal(String),
    /// Never reach the end: serve one generated event per call.
    Endless,
}

pub struct MockStore {
    history: Vec<(Position, EventRecord)>,
    pub calls: Mutex<Vec<ReadCall>>,
    mode: StoreMode,
}

impl MockStore {
    pub fn with_history(positions: &[u64]) -> Arc<Self> {
        let history = positions
            .iter()
            .map(|&n| (Position(n), make_record(n, "OrderPlaced")))
            .collect();
        Arc::new(Self {
            history,
            calls: Mutex::new(Vec::new()),
            mode: StoreMode::Normal,
        })
    }

    pub fn with_events(events: Vec<(u64, EventRecord)>) -> Arc<Self> {
        let history = events
            .into_iter()
            .map(|(n, record)| (Position(n), record))
            .collect();
        Arc::new(Self {
            history,
            calls: Mutex::new(Vec::new()),
            mode: StoreMode::Normal,
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            history: Vec::new(),
            calls: Mutex::new(Vec::new()),
            mode: StoreMode::FailFatal(message.to_string()),
        })
    }

    pub fn endless() -> Arc<Self> {
        Arc::new(Self {
            history: Vec::new(),
            calls: Mutex::new(Vec::new()),
            mode: StoreMode::Endless,
        })
    }

    pub fn read_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl StoreReader for MockStore {
    fn read_batch(
        &self,
        _selector: &StreamSelector,
        from: Position,
        batch_size: usize,
        search_window: Option<usize>,
    ) -> Result<ReadBatch, ReadError> {
        self.calls.lock().push(ReadCall {
            from,
            batch_size,
            search_window,
        });

        match &self.mode {
            StoreMode::FailFatal(msg) => Err(ReadError::Fatal(msg.clone())),
            StoreMode::Endless => {
                std::thread::sleep(Duration::from_millis(1));
                let n = from.0.max(1);
                Ok(ReadBatch {
                    events: vec![(Position(n), make_record(n, "OrderPlaced"))],
                    next_position: Position(n + 1),
                    end_reached: false,
                })
            }
            StoreMode::Normal => {
                let eligible: Vec<_> = self
                    .history
                    .iter()
                    .filter(|(p, _)| *p >= from)
                    .cloned()
                    .collect();
                let end_reached = eligible.len() <= batch_size;
                let chunk: Vec<_> = eligible.into_iter().take(batch_size).collect();
                let next_position = chunk.last().map_or(from, |(p, _)| p.next());
                Ok(ReadBatch {
                    events: chunk,
                    next_position,
                    end_reached,
                })
            }
        }
    }
}

// --- Live feed mock ---

pub struct MockFeed {
    /// Events published synchronously while handling `subscribe`, i.e.
    /// guaranteed to be buffered before any history is read.
    preload: Vec<(u64, EventRecord)>,
    sink: Mutex<Option<LiveSink>>,
    pub unsubscribed: Arc<AtomicBool>,
    fail_subscribe: bool,
}

impl MockFeed {
    pub fn new() -> Arc<Self> {
        Self::preloaded(Vec::new())
    }

    pub fn preloaded_positions(positions: &[u64]) -> Arc<Self> {
        Self::preloaded(
            positions
                .iter()
                .map(|&n| (n, make_record(n, "OrderPlaced")))
                .collect(),
        )
    }

    pub fn preloaded(preload: Vec<(u64, EventRecord)>) -> Arc<Self> {
        Arc::new(Self {
            preload,
            sink: Mutex::new(None),
            unsubscribed: Arc::new(AtomicBool::new(false)),
            fail_subscribe: false,
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            preload: Vec::new(),
            sink: Mutex::new(None),
            unsubscribed: Arc::new(AtomicBool::new(false)),
            fail_subscribe: true,
        })
    }

    /// Push a live event, as the store's notification thread would.
    pub fn publish(&self, n: u64, record: EventRecord) {
        let sink = self.sink.lock();
        sink.as_ref().expect("feed not subscribed").publish(Position(n), record);
    }

    /// Simulate an unexpected feed closure.
    pub fn close(&self) {
        let sink = self.sink.lock();
        sink.as_ref().expect("feed not subscribed").closed();
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribed.load(Ordering::SeqCst)
    }
}

impl LiveFeed for MockFeed {
    fn subscribe(
        &self,
        _selector: &StreamSelector,
        sink: LiveSink,
    ) -> Result<Box<dyn FeedHandle>, FeedError> {
        if self.fail_subscribe {
            return Err(FeedError("subscription refused".to_string()));
        }
        for (n, record) in &self.preload {
            sink.publish(Position(*n), record.clone());
        }
        *self.sink.lock() = Some(sink);
        Ok(Box::new(MockFeedHandle {
            unsubscribed: self.unsubscribed.clone(),
        }))
    }
}

struct MockFeedHandle {
    unsubscribed: Arc<AtomicBool>,
}

impl FeedHandle for MockFeedHandle {
    fn unsubscribe(&self) {
        self.unsubscribed.store(true, Ordering::SeqCst);
    }
}

// --- Link resolver mock ---

pub struct MockResolver {
    targets: HashMap<u64, EventRecord>,
    fail: bool,
}

impl MockResolver {
    /// Resolve each link by event number to the given target record.
    pub fn with_targets(targets: Vec<(u64, EventRecord)>) -> Arc<Self> {
        Arc::new(Self {
            targets: targets.into_iter().collect(),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            targets: HashMap::new(),
            fail: true,
        })
    }
}

impl LinkResolver for MockResolver {
    fn resolve(&self, link: &EventRecord) -> Result<EventRecord, ResolutionError> {
        if self.fail {
            return Err(ResolutionError("target unavailable".to_string()));
        }
        self.targets
            .get(&link.event_number)
            .cloned()
            .ok_or_else(|| ResolutionError(format!("no target for {}", link.event_number)))
    }
}

// --- Callback recording ---

#[derive(Debug)]
pub enum Notice {
    Event(ResolvedEvent),
    LiveStarted,
    Dropped(DropReason),
}

pub fn notice_channel() -> (Sender<Notice>, Receiver<Notice>) {
    unbounded()
}

/// Callbacks that forward every notification into a channel.
pub fn forward(
    tx: &Sender<Notice>,
) -> (
    impl FnMut(ResolvedEvent) -> SubscriberResult + Send + 'static,
    impl FnMut() + Send + 'static,
    impl FnOnce(&DropReason) + Send + 'static,
) {
    let event_tx = tx.clone();
    let live_tx = tx.clone();
    let drop_tx = tx.clone();
    (
        move |event: ResolvedEvent| {
            event_tx.send(Notice::Event(event)).unwrap();
            Ok(())
        },
        move || {
            live_tx.send(Notice::LiveStarted).unwrap();
        },
        move |reason: &DropReason| {
            drop_tx.send(Notice::Dropped(reason.clone())).unwrap();
        },
    )
}

/// Next notice, or panic after the shared timeout.
pub fn recv_notice(rx: &Receiver<Notice>) -> Notice {
    rx.recv_timeout(TIMEOUT).expect("timed out waiting for notice")
}

/// Assert the next notice is a delivered event and return it.
pub fn expect_event(rx: &Receiver<Notice>) -> ResolvedEvent {
    match recv_notice(rx) {
        Notice::Event(event) => event,
        other => panic!("expected event, got {:?}", other),
    }
}

/// Assert the next notices are events at exactly these positions.
pub fn expect_positions(rx: &Receiver<Notice>, positions: &[u64]) {
    for &n in positions {
        let event = expect_event(rx);
        assert_eq!(
            event.original_record().event_number,
            n,
            "unexpected delivery order"
        );
    }
}

/// Assert the next notice is the live-processing-started notification.
pub fn expect_live_started(rx: &Receiver<Notice>) {
    match recv_notice(rx) {
        Notice::LiveStarted => {}
        other => panic!("expected live-started, got {:?}", other),
    }
}

/// Assert the next notice is a drop with the expected reason.
pub fn expect_dropped(rx: &Receiver<Notice>) -> DropReason {
    match recv_notice(rx) {
        Notice::Dropped(reason) => reason,
        other => panic!("expected drop, got {:?}", other),
    }
}

/// Assert nothing further arrives within a short grace period.
pub fn expect_silence(rx: &Receiver<Notice>) {
    if let Ok(notice) = rx.recv_timeout(Duration::from_millis(100)) {
        panic!("expected no further notices, got {:?}", notice);
    }
}
