//! Historical batch reading.
//!
//! The [`HistoricalReader`] drains a stream's history in batches from the
//! external store reader. Transient failures are retried up to a bounded
//! attempt count (backoff and timing policy belong to the transport);
//! fatal failures propagate to the engine, which drops the subscription.

use crate::error::ReadError;
use crate::types::{EventRecord, Position, StreamSelector};
use std::sync::Arc;
use tracing::warn;

/// Max attempts per batch before a transient failure is treated as fatal.
const DEFAULT_MAX_READ_ATTEMPTS: u32 = 5;

/// One batch of historical events.
#[derive(Clone, Debug)]
pub struct ReadBatch {
    /// Events in position order, paired with their positions.
    pub events: Vec<(Position, EventRecord)>,

    /// Where the next read should start.
    pub next_position: Position,

    /// Whether the store reported no events beyond the requested position
    /// at the time of the call. Point-in-time only; new events may exist a
    /// moment later.
    pub end_reached: bool,
}

/// External collaborator that reads stored events in batches.
///
/// `search_window` caps how many underlying events the store may scan to
/// fill one filtered batch.
pub trait StoreReader: Send + Sync {
    fn read_batch(
        &self,
        selector: &StreamSelector,
        from: Position,
        batch_size: usize,
        search_window: Option<usize>,
    ) -> Result<ReadBatch, ReadError>;
}

/// Pulls successive batches from a starting position until the current
/// head is reached.
pub struct HistoricalReader {
    store: Arc<dyn StoreReader>,
    selector: StreamSelector,
    batch_size: usize,
    search_window: Option<usize>,
    max_attempts: u32,
}

impl HistoricalReader {
    pub fn new(
        store: Arc<dyn StoreReader>,
        selector: StreamSelector,
        batch_size: usize,
        search_window: Option<usize>,
    ) -> Self {
        Self {
            store,
            selector,
            batch_size,
            search_window,
            max_attempts: DEFAULT_MAX_READ_ATTEMPTS,
        }
    }

    #[cfg(test)]
    fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Read the next batch starting at `from`.
    ///
    /// Retries transient failures; only fatal errors are returned, either
    /// reported by the store or produced by retry exhaustion.
    pub fn next_batch(&self, from: Position) -> Result<ReadBatch, ReadError> {
        let mut attempt = 1;
        loop {
            match self
                .store
                .read_batch(&self.selector, from, self.batch_size, self.search_window)
            {
                Ok(batch) => return Ok(batch),
                Err(ReadError::Fatal(msg)) => return Err(ReadError::Fatal(msg)),
                Err(ReadError::Transient(msg)) => {
                    if attempt >= self.max_attempts {
                        return Err(ReadError::Fatal(format!(
                            "read retries exhausted after {} attempts: {}",
                            attempt, msg
                        )));
                    }
                    warn!(
                        stream = %self.selector,
                        from = %from,
                        attempt,
                        "transient read failure, retrying: {}",
                        msg
                    );
                    attempt += 1;
                }
            }
        }
    }
}
