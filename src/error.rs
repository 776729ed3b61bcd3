//! Error types for the pub/sub client facade
//!
//! Internal functions propagate [`ClientError`] with `?`. Nothing in the
//! public capability surface raises: every failure path terminates at the
//! facade boundary in a sentinel value (`false`, `0`, `None`) plus a log
//! line.

use crate::transport::mqtt::ConnectionState;
use thiserror::Error;

/// Error type for internal client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for internal client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_never_empty() {
        let errors = vec![
            ClientError::ConnectionFailed("refused".to_string()),
            ClientError::PublishFailed("broker gone".to_string().into()),
            ClientError::SubscriptionFailed("denied".to_string().into()),
            ClientError::NotConnected {
                state: ConnectionState::Disconnected("test".to_string()),
            },
            ClientError::InvalidConfig("bad port".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ClientError = json_err.into();
        assert!(matches!(err, ClientError::Serialization(_)));
    }
}
