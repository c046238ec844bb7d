//! Error types for the catch-up subscription engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for subscription operations.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("live feed subscribe failed: {0}")]
    Feed(#[from] FeedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by the store reader collaborator.
///
/// Transient failures are retried by the historical reader up to a bounded
/// attempt count; fatal failures drop the subscription immediately.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("transient read failure: {0}")]
    Transient(String),

    #[error("fatal read failure: {0}")]
    Fatal(String),
}

/// Failure reported by the live feed collaborator when subscribing.
#[derive(Debug, Error)]
#[error("feed error: {0}")]
pub struct FeedError(pub String);

/// Failure reported by the link resolver collaborator.
///
/// Non-fatal: the engine delivers the unresolved link record instead.
#[derive(Debug, Error)]
#[error("link resolution failed: {0}")]
pub struct ResolutionError(pub String);

/// Why a subscription was dropped.
///
/// Reported exactly once via the `on_dropped` callback. A user-initiated
/// stop is not a drop and produces no reason.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Live queue exceeded its capacity (slow consumer).
    QueueOverflow,
    /// Historical read failed fatally or exhausted its retries.
    ReadFailure(String),
    /// The caller's event callback returned an error.
    SubscriberError(String),
    /// The live feed closed unexpectedly.
    ConnectionLost,
}

/// Result type for subscription operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
