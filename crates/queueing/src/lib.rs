//! # Queueing
//!
//! Provider-agnostic, lease-based message queue access.
//!
//! This library provides:
//! - Sending opaque payloads to a named queue
//! - Leasing at most one message at a time under a visibility timeout
//! - Resolving a lease by committing (delete) or abandoning (release early)
//! - Reporting "lease already gone" as `Ok(false)` rather than an error
//! - An Azure Storage Queue binding over HTTP and an in-memory store
//!
//! Delivery is at-least-once: a message whose lease lapses without being
//! resolved is handed out again with a new lease token.
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Identifiers, timestamps and leased message data
//! - [`provider`] - Provider types, lease policy and configuration
//! - [`store`] - Backing store contract and lease outcome classification
//! - [`client`] - Capability traits and their store-backed implementations
//! - [`providers`] - Azure Storage Queue and in-memory backends
//! - [`settings`] - Layered settings for building a provider

// Module declarations
pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;
pub mod settings;
pub mod store;

// Re-export commonly used types at crate root for convenience
pub use client::{
    QueuedMessage, QueueingClient, QueueingProvider, QueueingProviderFactory, StoreQueuedMessage,
    StoreQueueingClient,
};
pub use error::{ConfigurationError, QueueError, ValidationError};
pub use message::{LeaseToken, LeasedMessage, MessageId, QueueName, Timestamp};
pub use provider::{
    AzureServiceVersion, AzureStorageQueueConfig, InMemoryConfig, LeasePolicy, MessageEncoding,
    ProviderConfig, ProviderType,
};
pub use providers::{
    AzureQueueStore, AzureStorageQueueProvider, InMemoryQueueStore, InMemoryQueueingProvider,
    StorageAccount,
};
pub use settings::{create_provider, QueueingSettings};
pub use store::{QueueStore, Resolution, StoreError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
