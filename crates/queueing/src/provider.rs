//! Provider types and configuration.

use crate::error::QueueError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Longest visibility timeout accepted by the reference store (7 days)
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Default payload limit of the in-memory store (10MB)
pub const DEFAULT_IN_MEMORY_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[default]
    AzureStorage,
    InMemory,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AzureStorage => write!(f, "AzureStorage"),
            Self::InMemory => write!(f, "InMemory"),
        }
    }
}

/// Lease and expiry policy a client applies to every send and receive
///
/// The store enforces both durations; the visibility timeout is not clamped
/// here, so a value above the store maximum is rejected by the store when
/// a message is received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    pub visibility_timeout: Duration,
    pub time_to_live: Duration,
}

impl LeasePolicy {
    /// Create a validated lease policy
    pub fn new(visibility_timeout: Duration, time_to_live: Duration) -> Result<Self, QueueError> {
        if visibility_timeout < Duration::zero() {
            return Err(QueueError::invalid_argument(
                "visibility_timeout",
                "must not be negative",
            ));
        }

        if time_to_live < Duration::zero() {
            return Err(QueueError::invalid_argument(
                "time_to_live",
                "must not be negative",
            ));
        }

        Ok(Self {
            visibility_timeout,
            time_to_live,
        })
    }
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::seconds(30),
            time_to_live: Duration::days(7),
        }
    }
}

/// Storage service API version sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AzureServiceVersion {
    #[serde(rename = "2019-12-12")]
    V2019_12_12,
    #[serde(rename = "2020-10-02")]
    V2020_10_02,
    #[serde(rename = "2021-02-12")]
    V2021_02_12,
    #[default]
    #[serde(rename = "2021-12-02")]
    V2021_12_02,
    #[serde(rename = "2023-11-03")]
    V2023_11_03,
}

impl AzureServiceVersion {
    /// Value of the `x-ms-version` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2019_12_12 => "2019-12-12",
            Self::V2020_10_02 => "2020-10-02",
            Self::V2021_02_12 => "2021-02-12",
            Self::V2021_12_02 => "2021-12-02",
            Self::V2023_11_03 => "2023-11-03",
        }
    }
}

/// How message bodies are represented in the store's text field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEncoding {
    /// Base64 text, safe for arbitrary bytes
    #[default]
    Base64,
    /// UTF-8 text stored verbatim; binary payloads are rejected
    Text,
}

/// Provider-specific configuration
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    AzureStorage(AzureStorageQueueConfig),
    InMemory(InMemoryConfig),
}

impl ProviderConfig {
    /// Get provider type
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::AzureStorage(_) => ProviderType::AzureStorage,
            Self::InMemory(_) => ProviderType::InMemory,
        }
    }
}

/// Azure Storage Queue configuration
#[derive(Clone)]
pub struct AzureStorageQueueConfig {
    pub connection_string: String,
    pub queue_name: String,
    pub policy: LeasePolicy,
    pub service_version: Option<AzureServiceVersion>,
    pub message_encoding: MessageEncoding,
    pub request_timeout: std::time::Duration,
}

impl AzureStorageQueueConfig {
    /// Create configuration with default encoding, version and timeout
    pub fn new(
        connection_string: impl Into<String>,
        queue_name: impl Into<String>,
        policy: LeasePolicy,
    ) -> Self {
        Self {
            connection_string: connection_string.into(),
            queue_name: queue_name.into(),
            policy,
            service_version: None,
            message_encoding: MessageEncoding::default(),
            request_timeout: std::time::Duration::from_secs(30),
        }
    }

    /// Select the storage service API version
    pub fn with_service_version(mut self, version: AzureServiceVersion) -> Self {
        self.service_version = Some(version);
        self
    }

    /// Select the message body encoding
    pub fn with_message_encoding(mut self, encoding: MessageEncoding) -> Self {
        self.message_encoding = encoding;
        self
    }
}

impl std::fmt::Debug for AzureStorageQueueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureStorageQueueConfig")
            .field("connection_string", &"<redacted>")
            .field("queue_name", &self.queue_name)
            .field("policy", &self.policy)
            .field("service_version", &self.service_version)
            .field("message_encoding", &self.message_encoding)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    pub queue_name: String,
    pub policy: LeasePolicy,
    pub max_message_size: usize,
}

impl InMemoryConfig {
    /// Create configuration for the named queue
    pub fn new(queue_name: impl Into<String>, policy: LeasePolicy) -> Self {
        Self {
            queue_name: queue_name.into(),
            policy,
            max_message_size: DEFAULT_IN_MEMORY_MAX_MESSAGE_SIZE,
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
