//! Layered settings for building a queueing provider.
//!
//! Sources (applied in order, later sources override earlier ones):
//!  1. Built-in defaults
//!  2. An optional settings file (format chosen by extension: YAML, TOML, JSON)
//!  3. Environment variables prefixed `QUEUEING__`
//!     e.g. `QUEUEING__QUEUE_NAME=orders` sets `queue_name = "orders"`

use crate::client::{QueueingProvider, QueueingProviderFactory};
use crate::error::{ConfigurationError, QueueError};
use crate::message::QueueName;
use crate::provider::{
    AzureServiceVersion, AzureStorageQueueConfig, InMemoryConfig, LeasePolicy, MessageEncoding,
    ProviderConfig, ProviderType,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Prefix of environment variables read by [`QueueingSettings::load`]
pub const ENVIRONMENT_PREFIX: &str = "QUEUEING";

const REDACTED: &str = "<redacted>";

/// Connection string keys whose values are secrets
const SECRET_KEYS: &[&str] = &["accountkey", "sharedaccesssignature"];

/// Settings describing one queue and the provider serving it
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueingSettings {
    /// Backing store
    pub provider: ProviderType,

    /// Storage connection string; required for `azure_storage`
    pub connection_string: Option<String>,

    /// Queue to send to and receive from
    pub queue_name: String,

    /// How long a received message stays invisible to other receivers
    pub visibility_timeout_seconds: i64,

    /// How long an unconsumed message is kept; zero means never expire
    pub time_to_live_seconds: i64,

    /// Storage service API version; latest supported when absent
    pub service_version: Option<AzureServiceVersion>,

    pub message_encoding: MessageEncoding,

    /// Per-request HTTP timeout
    pub request_timeout_seconds: u64,
}

impl Default for QueueingSettings {
    fn default() -> Self {
        let policy = LeasePolicy::default();
        Self {
            provider: ProviderType::default(),
            connection_string: None,
            queue_name: String::new(),
            visibility_timeout_seconds: policy.visibility_timeout.num_seconds(),
            time_to_live_seconds: policy.time_to_live.num_seconds(),
            service_version: None,
            message_encoding: MessageEncoding::default(),
            request_timeout_seconds: 30,
        }
    }
}

impl QueueingSettings {
    /// Load settings from defaults, an optional file, and the environment
    ///
    /// An explicitly named file must exist. Values that cannot be coerced to
    /// the expected type are an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading queueing settings from file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENVIRONMENT_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let settings: Self = config
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        debug!(
            provider = %settings.provider,
            queue = %settings.queue_name,
            "Loaded queueing settings"
        );

        Ok(settings)
    }

    /// Check that the settings describe a usable provider
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.queue_name.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "queue_name".to_string(),
            });
        }

        QueueName::new(self.queue_name.clone()).map_err(|e| ConfigurationError::Invalid {
            message: e.to_string(),
        })?;

        if self.provider == ProviderType::AzureStorage
            && self
                .connection_string
                .as_deref()
                .map_or(true, |c| c.trim().is_empty())
        {
            return Err(ConfigurationError::Missing {
                key: "connection_string".to_string(),
            });
        }

        seconds_setting("visibility_timeout_seconds", self.visibility_timeout_seconds)?;
        seconds_setting("time_to_live_seconds", self.time_to_live_seconds)?;

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "request_timeout_seconds must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Lease policy described by the settings
    pub fn lease_policy(&self) -> Result<LeasePolicy, QueueError> {
        LeasePolicy::new(
            seconds_setting("visibility_timeout_seconds", self.visibility_timeout_seconds)?,
            seconds_setting("time_to_live_seconds", self.time_to_live_seconds)?,
        )
    }

    /// Provider configuration described by the settings
    pub fn to_provider_config(&self) -> Result<ProviderConfig, QueueError> {
        self.validate()?;
        let policy = self.lease_policy()?;

        let config = match self.provider {
            ProviderType::AzureStorage => {
                let mut azure = AzureStorageQueueConfig::new(
                    self.connection_string.clone().unwrap_or_default(),
                    self.queue_name.clone(),
                    policy,
                )
                .with_message_encoding(self.message_encoding);
                if let Some(version) = self.service_version {
                    azure = azure.with_service_version(version);
                }
                azure.request_timeout = std::time::Duration::from_secs(self.request_timeout_seconds);
                ProviderConfig::AzureStorage(azure)
            }
            ProviderType::InMemory => {
                ProviderConfig::InMemory(InMemoryConfig::new(self.queue_name.clone(), policy))
            }
        };

        Ok(config)
    }

    /// Copy of the settings that is safe to print
    pub fn redacted(&self) -> Self {
        Self {
            connection_string: self
                .connection_string
                .as_deref()
                .map(redact_connection_string),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for QueueingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = self.redacted();
        f.debug_struct("QueueingSettings")
            .field("provider", &redacted.provider)
            .field("connection_string", &redacted.connection_string)
            .field("queue_name", &redacted.queue_name)
            .field(
                "visibility_timeout_seconds",
                &redacted.visibility_timeout_seconds,
            )
            .field("time_to_live_seconds", &redacted.time_to_live_seconds)
            .field("service_version", &redacted.service_version)
            .field("message_encoding", &redacted.message_encoding)
            .field("request_timeout_seconds", &redacted.request_timeout_seconds)
            .finish()
    }
}

/// Convert a whole-second setting into a duration
fn seconds_setting(key: &str, value: i64) -> Result<Duration, ConfigurationError> {
    if value < 0 {
        return Err(ConfigurationError::Invalid {
            message: format!("{} must not be negative", key),
        });
    }

    Duration::try_seconds(value).ok_or_else(|| ConfigurationError::Invalid {
        message: format!("{} is too large", key),
    })
}

/// Replace secret values of a connection string, keeping its shape
pub fn redact_connection_string(connection_string: &str) -> String {
    connection_string
        .split(';')
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, _)) if SECRET_KEYS.contains(&key.trim().to_ascii_lowercase().as_str()) => {
                format!("{}={}", key, REDACTED)
            }
            Some(_) => segment.to_string(),
            None => REDACTED.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Build the provider described by the settings
pub fn create_provider(settings: &QueueingSettings) -> Result<Box<dyn QueueingProvider>, QueueError> {
    let config = settings.to_provider_config()?;
    QueueingProviderFactory::create_provider(config)
}
