//! Error types for queueing operations.

use thiserror::Error;

/// Error type for all queueing operations.
///
/// A commit or abandon whose lease is already gone is not an error; it is
/// reported as `Ok(false)` by [`QueuedMessage`](crate::QueuedMessage).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Queue service error (status {status}): {code} - {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Message encoding failed: {message}")]
    Encoding { message: String },

    #[error("Operation '{operation}' was cancelled")]
    Cancelled { operation: String },
}

impl QueueError {
    /// Create an invalid argument error for the named field
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check if error is transient so that a caller-side retry may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidArgument { .. } => false,
            Self::Transport { .. } => true,
            Self::Service { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Encoding { .. } => false,
            Self::Cancelled { .. } => false,
        }
    }

    /// Status code reported by the backing store, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

impl From<ValidationError> for QueueError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::Required { field } => Self::InvalidArgument {
                field,
                message: "value is required".to_string(),
            },
            ValidationError::InvalidFormat { field, message }
            | ValidationError::OutOfRange { field, message } => {
                Self::InvalidArgument { field, message }
            }
        }
    }
}

impl From<ConfigurationError> for QueueError {
    fn from(error: ConfigurationError) -> Self {
        match error {
            ConfigurationError::Missing { key } => Self::InvalidArgument {
                field: key,
                message: "value is required".to_string(),
            },
            ConfigurationError::Invalid { message } | ConfigurationError::Parsing { message } => {
                Self::InvalidArgument {
                    field: "configuration".to_string(),
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
