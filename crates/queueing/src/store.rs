//! Backing store contract.
//!
//! A [`QueueStore`] is a handle to one named queue in some backing store (a
//! cloud queue service, an in-process queue, ...). It exposes the four
//! primitives the lease lifecycle is built on. The generic client and message
//! types in [`crate::client`] implement the public capability traits on top of
//! any store.
//!
//! Store failures carry the store's own status classification. Only the
//! resolution primitives interpret it: a `400 BadRequest` or `404 NotFound`
//! from [`QueueStore::delete_leased_message`] or
//! [`QueueStore::release_lease_early`] means the lease is already gone.

use crate::error::QueueError;
use crate::message::{LeaseToken, LeasedMessage, MessageId, QueueName};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Failure reported by a backing store primitive
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store returned status {status}: {code} - {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("encoding failure: {0}")]
    Encoding(String),
}

impl StoreError {
    /// Create a status error
    pub fn status(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Check if the store reported that the addressed lease no longer exists
    ///
    /// Covers an invalid or superseded lease token (400) and a message that was
    /// already deleted or expired (404).
    pub fn is_lease_gone(&self) -> bool {
        matches!(self, Self::Status { status: 400 | 404, .. })
    }

    /// Map store error to QueueError
    pub fn to_queue_error(self) -> QueueError {
        match self {
            Self::Status {
                status,
                code,
                message,
            } => QueueError::Service {
                status,
                code,
                message,
            },
            Self::Transport(message) => QueueError::Transport { message },
            Self::Encoding(message) => QueueError::Encoding { message },
        }
    }
}

impl From<StoreError> for QueueError {
    fn from(error: StoreError) -> Self {
        error.to_queue_error()
    }
}

/// Outcome of a lease resolution call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The store accepted the commit or abandon
    Resolved,
    /// The lease had already expired, been superseded, or been resolved
    LeaseGone,
}

impl Resolution {
    /// Check if the resolution took effect
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }
}

/// Classify the result of a resolution primitive
///
/// The lease-gone condition becomes a value; every other failure stays an error.
pub fn classify_resolution(result: Result<(), StoreError>) -> Result<Resolution, QueueError> {
    match result {
        Ok(()) => Ok(Resolution::Resolved),
        Err(e) if e.is_lease_gone() => Ok(Resolution::LeaseGone),
        Err(e) => Err(e.to_queue_error()),
    }
}

/// Interface implemented by backing stores (one instance per named queue)
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Name of the queue this handle is bound to
    fn queue_name(&self) -> &QueueName;

    /// Add a message that becomes visible after `initial_delay` and is
    /// discarded once `time_to_live` has elapsed
    async fn enqueue(
        &self,
        body: Bytes,
        initial_delay: Duration,
        time_to_live: Duration,
    ) -> Result<(), StoreError>;

    /// Lease at most one visible message, hiding it for `visibility_timeout`
    async fn receive(
        &self,
        visibility_timeout: Duration,
    ) -> Result<Option<LeasedMessage>, StoreError>;

    /// Permanently delete the message held under the given lease
    async fn delete_leased_message(
        &self,
        message_id: &MessageId,
        lease_token: &LeaseToken,
    ) -> Result<(), StoreError>;

    /// Make the leased message visible again immediately
    async fn release_lease_early(
        &self,
        message_id: &MessageId,
        lease_token: &LeaseToken,
    ) -> Result<(), StoreError>;
}
