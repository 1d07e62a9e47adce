//! Client traits and implementations for queue operations.
//!
//! Three capability sets make up the public contract:
//! - [`QueueingProvider`] manufactures clients from immutable configuration
//! - [`QueueingClient`] sends to and leases from one named queue
//! - [`QueuedMessage`] resolves one lease by committing or abandoning it
//!
//! [`StoreQueueingClient`] and [`StoreQueuedMessage`] implement the last two
//! over any [`QueueStore`], so a new backend only has to provide the store
//! primitives and a provider.

use crate::error::QueueError;
use crate::message::{LeaseToken, LeasedMessage, MessageId, QueueName, Timestamp};
use crate::provider::{LeasePolicy, ProviderConfig, ProviderType};
use crate::providers::{AzureStorageQueueProvider, InMemoryQueueingProvider};
use crate::store::{classify_resolution, QueueStore, Resolution};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// One leased message and its resolution operations
///
/// A message is resolved at most once successfully. Resolution is always
/// delegated to the store: a repeated commit or abandon reaches the store,
/// which no longer recognises the lease, and returns `Ok(false)`.
#[async_trait]
pub trait QueuedMessage: Send + Sync + fmt::Debug {
    /// Payload bytes
    fn body(&self) -> &Bytes;

    /// Payload as UTF-8 text
    fn body_text(&self) -> Result<&str, QueueError> {
        std::str::from_utf8(self.body()).map_err(|e| QueueError::Encoding {
            message: format!("Message body is not valid UTF-8: {}", e),
        })
    }

    /// Store-issued identifier, stable across redeliveries
    fn message_id(&self) -> &MessageId;

    /// Token identifying this lease instance
    fn lease_token(&self) -> &LeaseToken;

    /// Number of times the store has handed out this message
    fn dequeue_count(&self) -> u32;

    /// Time at which the store discards the message, if reported
    fn expires_at(&self) -> Option<&Timestamp>;

    /// Permanently delete the message
    ///
    /// Returns `Ok(false)` if the lease was already gone (expired and
    /// redelivered, or already committed or abandoned).
    async fn try_commit(&self, cancel: &CancellationToken) -> Result<bool, QueueError>;

    /// Release the lease early so the message becomes visible immediately
    ///
    /// Returns `Ok(false)` under the same conditions as [`Self::try_commit`].
    async fn try_abandon(&self, cancel: &CancellationToken) -> Result<bool, QueueError>;
}

/// Send and lease operations against one named queue
#[async_trait]
pub trait QueueingClient: Send + Sync {
    /// Name of the queue
    fn queue_name(&self) -> &QueueName;

    /// How long a received message stays invisible to other receivers
    fn visibility_timeout(&self) -> Duration;

    /// How long an unconsumed message is kept by the store
    fn time_to_live(&self) -> Duration;

    /// Enqueue a payload, visible immediately
    async fn send_message(&self, body: Bytes, cancel: &CancellationToken)
        -> Result<(), QueueError>;

    /// Enqueue a text payload, visible immediately
    async fn send_text(&self, text: &str, cancel: &CancellationToken) -> Result<(), QueueError> {
        self.send_message(Bytes::copy_from_slice(text.as_bytes()), cancel)
            .await
    }

    /// Lease at most one available message
    ///
    /// Returns `Ok(None)` when the queue has no visible message.
    async fn try_receive_message(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Box<dyn QueuedMessage>>, QueueError>;
}

/// Factory holding immutable configuration for one queue
pub trait QueueingProvider: Send + Sync {
    /// Create a client; each call returns an independent instance
    fn create_client(&self) -> Box<dyn QueueingClient>;

    /// Name of the queue clients are bound to
    fn queue_name(&self) -> &QueueName;

    /// Lease policy handed to every client
    fn policy(&self) -> LeasePolicy;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Factory for creating queueing providers from configuration
pub struct QueueingProviderFactory;

impl QueueingProviderFactory {
    /// Create provider from configuration
    pub fn create_provider(config: ProviderConfig) -> Result<Box<dyn QueueingProvider>, QueueError> {
        let provider: Box<dyn QueueingProvider> = match config {
            ProviderConfig::AzureStorage(azure_config) => {
                Box::new(AzureStorageQueueProvider::new(azure_config)?)
            }
            ProviderConfig::InMemory(in_memory_config) => {
                Box::new(InMemoryQueueingProvider::new(in_memory_config)?)
            }
        };

        Ok(provider)
    }

    /// Create test provider with an in-memory store
    pub fn create_test_provider(queue_name: &str) -> Result<Box<dyn QueueingProvider>, QueueError> {
        Self::create_provider(ProviderConfig::InMemory(
            crate::provider::InMemoryConfig::new(queue_name, LeasePolicy::default()),
        ))
    }
}

/// Run a store call unless the caller cancels first
async fn run_cancellable<T, F>(
    operation: &'static str,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, QueueError>
where
    F: Future<Output = Result<T, QueueError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(operation, "Queue operation cancelled");
            Err(QueueError::Cancelled {
                operation: operation.to_string(),
            })
        }
        result = call => result,
    }
}

// ============================================================================
// Store-backed implementations
// ============================================================================

/// Queueing client over any backing store
pub struct StoreQueueingClient<S: QueueStore> {
    store: Arc<S>,
    policy: LeasePolicy,
}

impl<S: QueueStore + 'static> StoreQueueingClient<S> {
    /// Create new client over a store handle
    pub fn new(store: S, policy: LeasePolicy) -> Self {
        Self {
            store: Arc::new(store),
            policy,
        }
    }
}

impl<S: QueueStore> fmt::Debug for StoreQueueingClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreQueueingClient")
            .field("queue_name", self.store.queue_name())
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl<S: QueueStore + 'static> QueueingClient for StoreQueueingClient<S> {
    fn queue_name(&self) -> &QueueName {
        self.store.queue_name()
    }

    fn visibility_timeout(&self) -> Duration {
        self.policy.visibility_timeout
    }

    fn time_to_live(&self) -> Duration {
        self.policy.time_to_live
    }

    #[instrument(skip(self, body, cancel), fields(queue = %self.store.queue_name(), size = body.len()))]
    async fn send_message(
        &self,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        let store = &self.store;
        let time_to_live = self.policy.time_to_live;

        run_cancellable("send_message", cancel, async move {
            store
                .enqueue(body, Duration::zero(), time_to_live)
                .await
                .map_err(QueueError::from)
        })
        .await?;

        debug!("Message enqueued");
        Ok(())
    }

    #[instrument(skip(self, cancel), fields(queue = %self.store.queue_name()))]
    async fn try_receive_message(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Box<dyn QueuedMessage>>, QueueError> {
        let store = &self.store;
        let visibility_timeout = self.policy.visibility_timeout;

        let leased = run_cancellable("try_receive_message", cancel, async move {
            store
                .receive(visibility_timeout)
                .await
                .map_err(QueueError::from)
        })
        .await?;

        let Some(leased) = leased else {
            debug!("No message available");
            return Ok(None);
        };

        debug!(
            message_id = %leased.message_id,
            dequeue_count = leased.dequeue_count,
            "Message leased"
        );

        let message: Box<dyn QueuedMessage> =
            Box::new(StoreQueuedMessage::new(leased, Arc::clone(&self.store)));
        Ok(Some(message))
    }
}

/// Leased message over any backing store
pub struct StoreQueuedMessage<S: QueueStore> {
    leased: LeasedMessage,
    store: Arc<S>,
}

impl<S: QueueStore> StoreQueuedMessage<S> {
    /// Wrap a leased message together with the store that issued it
    pub fn new(leased: LeasedMessage, store: Arc<S>) -> Self {
        Self { leased, store }
    }

    /// Store-reported lease details
    pub fn leased(&self) -> &LeasedMessage {
        &self.leased
    }

    fn log_outcome(&self, operation: &'static str, outcome: Resolution) {
        match outcome {
            Resolution::Resolved => {
                debug!(message_id = %self.leased.message_id, operation, "Lease resolved")
            }
            Resolution::LeaseGone => debug!(
                message_id = %self.leased.message_id,
                operation,
                "Lease already gone; resolution not applied"
            ),
        }
    }
}

impl<S: QueueStore> fmt::Debug for StoreQueuedMessage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreQueuedMessage")
            .field("queue_name", self.store.queue_name())
            .field("message_id", &self.leased.message_id)
            .field("dequeue_count", &self.leased.dequeue_count)
            .field("body_len", &self.leased.body.len())
            .finish()
    }
}

#[async_trait]
impl<S: QueueStore + 'static> QueuedMessage for StoreQueuedMessage<S> {
    fn body(&self) -> &Bytes {
        &self.leased.body
    }

    fn message_id(&self) -> &MessageId {
        &self.leased.message_id
    }

    fn lease_token(&self) -> &LeaseToken {
        &self.leased.lease_token
    }

    fn dequeue_count(&self) -> u32 {
        self.leased.dequeue_count
    }

    fn expires_at(&self) -> Option<&Timestamp> {
        self.leased.expires_at.as_ref()
    }

    #[instrument(skip(self, cancel), fields(queue = %self.store.queue_name(), message_id = %self.leased.message_id))]
    async fn try_commit(&self, cancel: &CancellationToken) -> Result<bool, QueueError> {
        let outcome = run_cancellable("try_commit", cancel, async {
            classify_resolution(
                self.store
                    .delete_leased_message(&self.leased.message_id, &self.leased.lease_token)
                    .await,
            )
        })
        .await?;

        self.log_outcome("try_commit", outcome);
        Ok(outcome.is_resolved())
    }

    #[instrument(skip(self, cancel), fields(queue = %self.store.queue_name(), message_id = %self.leased.message_id))]
    async fn try_abandon(&self, cancel: &CancellationToken) -> Result<bool, QueueError> {
        let outcome = run_cancellable("try_abandon", cancel, async {
            classify_resolution(
                self.store
                    .release_lease_early(&self.leased.message_id, &self.leased.lease_token)
                    .await,
            )
        })
        .await?;

        self.log_outcome("try_abandon", outcome);
        Ok(outcome.is_resolved())
    }
}
