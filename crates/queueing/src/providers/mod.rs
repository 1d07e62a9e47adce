//! Queue provider implementations.
//!
//! This module contains concrete implementations of the `QueueStore` and
//! `QueueingProvider` traits for different queue backends.

pub mod azure;
pub mod memory;

pub use azure::{AzureQueueStore, AzureStorageQueueProvider, StorageAccount};
pub use memory::{InMemoryQueueStore, InMemoryQueueingProvider};
