//! # Catch-up Subscriptions
//!
//! The catch-up subscription engine of an event store client: delivers
//! every event appended to a stream (or the whole store) from an arbitrary
//! historical position, with no gaps and no duplicates, by draining
//! history in batches and then switching seamlessly to the live push feed.
//!
//! ## Core Concepts
//!
//! - **Settings**: validated, immutable per-subscription configuration
//! - **Historical reader**: pull-based batch reads until the head
//! - **Live queue**: bounded buffer fed by the push feed during catch-up
//! - **Engine**: reconciles both sources into one ordered delivery stream
//!
//! The store itself stays behind the [`StoreReader`], [`LiveFeed`] and
//! [`LinkResolver`] collaborator traits; this crate owns ordering,
//! deduplication, filtering and the subscription lifecycle.
//!
//! ## Example
//!
//! ```ignore
//! use catchup::{CatchUpEngine, SettingsOptions, StreamSelector};
//!
//! let engine = CatchUpEngine::new(store_reader, live_feed);
//!
//! let handle = engine.start(
//!     StreamSelector::stream("orders"),
//!     None,
//!     SettingsOptions::default(),
//!     |event| {
//!         println!("{} @ {}", event.record().event_type, event.record().event_number);
//!         Ok(())
//!     },
//!     || println!("live!"),
//!     |reason| eprintln!("dropped: {:?}", reason),
//! )?;
//!
//! // Later, shut down gracefully
//! handle.stop();
//! ```

pub mod engine;
pub mod error;
pub mod filter;
pub mod live;
pub mod reader;
pub mod settings;
pub mod types;

// Re-exports
pub use engine::{CatchUpEngine, LinkResolver, SubscriberResult, SubscriptionHandle};
pub use error::{DropReason, FeedError, ReadError, ResolutionError, Result, SubscriptionError};
pub use filter::EventFilter;
pub use live::{FeedHandle, LiveEntry, LiveFeed, LiveQueue, LiveSink, QueueFull};
pub use reader::{HistoricalReader, ReadBatch, StoreReader};
pub use settings::{
    SettingsOptions, SubscriptionSettings, TypeMatchRule, DEFAULT_MAX_LIVE_QUEUE_SIZE,
    DEFAULT_READ_BATCH_SIZE, READ_BATCH_SIZE_RANGE,
};
pub use types::*;
