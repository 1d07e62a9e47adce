//! In-memory queue provider implementation for testing and development.
//!
//! This module provides a fully functional in-memory queue that follows the
//! lease rules of the reference store:
//! - Receiving a message issues a fresh lease token and hides the message
//!   for the visibility timeout
//! - Only the most recent lease token of a message is accepted; releasing a
//!   lease early issues a new token, so the old one stops working
//! - Messages expire after their time-to-live and are purged lazily
//! - Status codes mirror the reference store (400, 404, 413)
//!
//! Durations keep millisecond precision, where the reference store works in
//! whole seconds. A receive still requires a positive visibility timeout.
//!
//! All clients created by one [`InMemoryQueueingProvider`] share the same
//! queue. Mutual exclusion between concurrent receivers is provided by the
//! store's internal lock.

use crate::client::{QueueingClient, QueueingProvider, StoreQueueingClient};
use crate::error::QueueError;
use crate::message::{LeaseToken, LeasedMessage, MessageId, QueueName, Timestamp};
use crate::provider::{
    InMemoryConfig, LeasePolicy, ProviderType, MAX_VISIBILITY_TIMEOUT_SECONDS,
};
use crate::store::{QueueStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for one queue
#[derive(Default)]
struct QueueStorage {
    /// Messages in insertion order
    messages: VecDeque<StoredMessage>,
}

impl QueueStorage {
    /// Drop messages whose time-to-live has elapsed
    fn purge_expired(&mut self, now: &Timestamp) {
        let before = self.messages.len();
        self.messages.retain(|m| !m.is_expired_at(now));
        let purged = before - self.messages.len();
        if purged > 0 {
            debug!(purged, "Purged expired messages");
        }
    }

    /// Find a live message by ID
    fn find_mut(&mut self, message_id: &MessageId, now: &Timestamp) -> Option<&mut StoredMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.message_id == *message_id && !m.is_expired_at(now))
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    inserted_at: Timestamp,
    expires_at: Option<Timestamp>,
    visible_at: Timestamp,
    dequeue_count: u32,
    lease_token: Option<LeaseToken>,
}

impl StoredMessage {
    fn new(body: Bytes, initial_delay: Duration, time_to_live: Duration) -> Self {
        let now = Timestamp::now();
        // A time-to-live beyond the representable range never expires
        let expires_at = if time_to_live <= Duration::zero() {
            None
        } else {
            now.checked_plus(time_to_live)
        };

        Self {
            message_id: MessageId::new(),
            body,
            inserted_at: now.clone(),
            expires_at,
            visible_at: now.plus(initial_delay),
            dequeue_count: 0,
            lease_token: None,
        }
    }

    /// Check if message is expired based on TTL
    fn is_expired_at(&self, now: &Timestamp) -> bool {
        match self.expires_at {
            Some(ref expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Check if message is available for receiving
    fn is_visible_at(&self, now: &Timestamp) -> bool {
        *now >= self.visible_at
    }

    /// Verify that the caller holds the current lease
    fn check_lease(&self, lease_token: &LeaseToken) -> Result<(), StoreError> {
        match self.lease_token {
            Some(ref current) if current == lease_token => Ok(()),
            _ => Err(StoreError::status(
                400,
                "PopReceiptMismatch",
                "The specified pop receipt did not match the pop receipt for a dequeued message.",
            )),
        }
    }

    fn to_leased(&self, lease_token: LeaseToken) -> LeasedMessage {
        LeasedMessage {
            message_id: self.message_id.clone(),
            lease_token,
            body: self.body.clone(),
            dequeue_count: self.dequeue_count,
            inserted_at: Some(self.inserted_at.clone()),
            expires_at: self.expires_at.clone(),
            next_visible_at: Some(self.visible_at.clone()),
        }
    }
}

fn message_not_found() -> StoreError {
    StoreError::status(
        404,
        "MessageNotFound",
        "The specified message does not exist.",
    )
}

fn validate_visibility(
    field: &str,
    value: Duration,
    allow_zero: bool,
) -> Result<(), StoreError> {
    let too_short = if allow_zero {
        value < Duration::zero()
    } else {
        value <= Duration::zero()
    };
    if too_short || value > Duration::seconds(MAX_VISIBILITY_TIMEOUT_SECONDS) {
        return Err(StoreError::status(
            400,
            "OutOfRangeQueryParameterValue",
            format!(
                "Value for {} is outside the accepted range (at most {} seconds).",
                field, MAX_VISIBILITY_TIMEOUT_SECONDS
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// InMemoryQueueStore
// ============================================================================

/// Store handle onto the shared in-memory queue
pub struct InMemoryQueueStore {
    queue_name: QueueName,
    storage: Arc<RwLock<QueueStorage>>,
    max_message_size: usize,
}

impl InMemoryQueueStore {
    fn write(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, StoreError> {
        self.storage
            .write()
            .map_err(|_| StoreError::Transport("in-memory queue lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    async fn enqueue(
        &self,
        body: Bytes,
        initial_delay: Duration,
        time_to_live: Duration,
    ) -> Result<(), StoreError> {
        if body.len() > self.max_message_size {
            return Err(StoreError::status(
                413,
                "RequestBodyTooLarge",
                format!(
                    "Message of {} bytes exceeds the limit of {} bytes.",
                    body.len(),
                    self.max_message_size
                ),
            ));
        }

        validate_visibility("visibilitytimeout", initial_delay, true)?;
        if time_to_live > Duration::zero() && initial_delay >= time_to_live {
            return Err(StoreError::status(
                400,
                "InvalidQueryParameterValue",
                "Initial visibility delay must be smaller than the time-to-live.",
            ));
        }

        let message = StoredMessage::new(body, initial_delay, time_to_live);
        debug!(queue = %self.queue_name, message_id = %message.message_id, "Stored message");

        self.write()?.messages.push_back(message);
        Ok(())
    }

    async fn receive(
        &self,
        visibility_timeout: Duration,
    ) -> Result<Option<LeasedMessage>, StoreError> {
        validate_visibility("visibilitytimeout", visibility_timeout, false)?;

        let now = Timestamp::now();
        let mut storage = self.write()?;
        storage.purge_expired(&now);

        let Some(message) = storage.messages.iter_mut().find(|m| m.is_visible_at(&now)) else {
            return Ok(None);
        };

        let lease_token = LeaseToken::generate();
        message.lease_token = Some(lease_token.clone());
        message.visible_at = now.plus(visibility_timeout);
        message.dequeue_count += 1;

        Ok(Some(message.to_leased(lease_token)))
    }

    async fn delete_leased_message(
        &self,
        message_id: &MessageId,
        lease_token: &LeaseToken,
    ) -> Result<(), StoreError> {
        let now = Timestamp::now();
        let mut storage = self.write()?;

        let message = storage
            .find_mut(message_id, &now)
            .ok_or_else(message_not_found)?;
        message.check_lease(lease_token)?;

        storage.messages.retain(|m| m.message_id != *message_id);
        debug!(queue = %self.queue_name, message_id = %message_id, "Deleted message");
        Ok(())
    }

    async fn release_lease_early(
        &self,
        message_id: &MessageId,
        lease_token: &LeaseToken,
    ) -> Result<(), StoreError> {
        let now = Timestamp::now();
        let mut storage = self.write()?;

        let message = storage
            .find_mut(message_id, &now)
            .ok_or_else(message_not_found)?;
        message.check_lease(lease_token)?;

        message.lease_token = Some(LeaseToken::generate());
        message.visible_at = now;
        debug!(queue = %self.queue_name, message_id = %message_id, "Released lease");
        Ok(())
    }
}

// ============================================================================
// InMemoryQueueingProvider
// ============================================================================

/// In-memory queueing provider
///
/// Clients created by the same provider share one queue; separate providers
/// are fully independent.
pub struct InMemoryQueueingProvider {
    queue_name: QueueName,
    policy: LeasePolicy,
    max_message_size: usize,
    storage: Arc<RwLock<QueueStorage>>,
}

impl InMemoryQueueingProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Result<Self, QueueError> {
        let queue_name = QueueName::new(config.queue_name)?;
        let policy = LeasePolicy::new(
            config.policy.visibility_timeout,
            config.policy.time_to_live,
        )?;

        info!(queue = %queue_name, "Created in-memory queueing provider");

        Ok(Self {
            queue_name,
            policy,
            max_message_size: config.max_message_size,
            storage: Arc::new(RwLock::new(QueueStorage::default())),
        })
    }

    /// Approximate number of messages in the queue, leased or not
    pub fn approximate_message_count(&self) -> Result<usize, QueueError> {
        let now = Timestamp::now();
        let storage = self.read()?;
        Ok(storage
            .messages
            .iter()
            .filter(|m| !m.is_expired_at(&now))
            .count())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, QueueStorage>, QueueError> {
        self.storage.read().map_err(|_| QueueError::Transport {
            message: "in-memory queue lock poisoned".to_string(),
        })
    }
}

impl std::fmt::Debug for InMemoryQueueingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryQueueingProvider")
            .field("queue_name", &self.queue_name)
            .field("policy", &self.policy)
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

impl QueueingProvider for InMemoryQueueingProvider {
    fn create_client(&self) -> Box<dyn QueueingClient> {
        let store = InMemoryQueueStore {
            queue_name: self.queue_name.clone(),
            storage: Arc::clone(&self.storage),
            max_message_size: self.max_message_size,
        };

        Box::new(StoreQueueingClient::new(store, self.policy))
    }

    fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    fn policy(&self) -> LeasePolicy {
        self.policy
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
