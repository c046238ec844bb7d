//! Subscription configuration with validation.

use crate::error::{Result, SubscriptionError};
use crate::filter::EventFilter;

/// Default live queue capacity.
pub const DEFAULT_MAX_LIVE_QUEUE_SIZE: usize = 10_000;

/// Default number of events per historical read batch.
pub const DEFAULT_READ_BATCH_SIZE: usize = 500;

/// Allowed range for the read batch size.
pub const READ_BATCH_SIZE_RANGE: std::ops::RangeInclusive<usize> = 1..=4096;

/// One allow-list rule for event types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeMatchRule {
    /// Exact event type.
    Literal(String),
    /// Pattern matched against the whole event type.
    Pattern(String),
}

impl TypeMatchRule {
    pub fn literal(s: impl Into<String>) -> Self {
        TypeMatchRule::Literal(s.into())
    }

    pub fn pattern(s: impl Into<String>) -> Self {
        TypeMatchRule::Pattern(s.into())
    }
}

/// Options for building [`SubscriptionSettings`]. All fields default to the
/// store client's standard values.
#[derive(Clone, Debug)]
pub struct SettingsOptions {
    /// Max events buffered from the live feed before the subscription is
    /// dropped. Going above drops the subscription.
    pub max_live_queue_size: usize,

    /// Whether to resolve link events to their targets.
    pub resolve_link_tos: bool,

    /// Events per batch when reading history. Allowed range [1, 4096].
    pub read_batch_size: usize,

    /// Max events the store may scan to fill one filtered batch.
    /// `None` means the store default.
    pub max_search_window: Option<usize>,

    /// Event type allow-list. Empty means all types pass.
    pub allowed_event_types: Vec<TypeMatchRule>,
}

impl Default for SettingsOptions {
    fn default() -> Self {
        Self {
            max_live_queue_size: DEFAULT_MAX_LIVE_QUEUE_SIZE,
            resolve_link_tos: false,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            max_search_window: None,
            allowed_event_types: Vec::new(),
        }
    }
}

/// Validated, immutable subscription settings.
///
/// Built once per subscription via [`SubscriptionSettings::from_options`]
/// and shared read-only by all engine components.
#[derive(Clone, Debug)]
pub struct SubscriptionSettings {
    max_live_queue_size: usize,
    resolve_link_tos: bool,
    read_batch_size: usize,
    max_search_window: Option<usize>,
    filter: EventFilter,
}

impl SubscriptionSettings {
    /// Validate options and build settings.
    ///
    /// Fails with [`SubscriptionError::Configuration`] when the queue size
    /// is zero, the batch size is out of range, the search window is
    /// smaller than the batch size, or a pattern rule does not compile.
    pub fn from_options(options: SettingsOptions) -> Result<Self> {
        if options.max_live_queue_size == 0 {
            return Err(SubscriptionError::Configuration(
                "max_live_queue_size should be positive".to_string(),
            ));
        }

        if !READ_BATCH_SIZE_RANGE.contains(&options.read_batch_size) {
            return Err(SubscriptionError::Configuration(format!(
                "read_batch_size is out of range. Allowed range: [{}, {}]",
                READ_BATCH_SIZE_RANGE.start(),
                READ_BATCH_SIZE_RANGE.end()
            )));
        }

        if let Some(window) = options.max_search_window {
            if window < options.read_batch_size {
                return Err(SubscriptionError::Configuration(format!(
                    "max_search_window ({}) should not be smaller than read_batch_size ({})",
                    window, options.read_batch_size
                )));
            }
        }

        let filter = EventFilter::compile(&options.allowed_event_types)?;

        Ok(Self {
            max_live_queue_size: options.max_live_queue_size,
            resolve_link_tos: options.resolve_link_tos,
            read_batch_size: options.read_batch_size,
            max_search_window: options.max_search_window,
            filter,
        })
    }

    /// Settings with every option at its default.
    pub fn default_settings() -> Self {
        Self::from_options(SettingsOptions::default()).expect("defaults are valid")
    }

    pub fn max_live_queue_size(&self) -> usize {
        self.max_live_queue_size
    }

    pub fn resolve_link_tos(&self) -> bool {
        self.resolve_link_tos
    }

    pub fn read_batch_size(&self) -> usize {
        self.read_batch_size
    }

    pub fn max_search_window(&self) -> Option<usize> {
        self.max_search_window
    }

    /// The compiled event type filter.
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}
