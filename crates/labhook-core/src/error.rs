//! Error types for Labhook

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a subscriber callback.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    // Construction Errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // Dispatch Errors
    #[error("Subscriber on channel '{channel}' failed: {source}")]
    Listener {
        channel: String,
        #[source]
        source: ListenerError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::Listener { .. } => "ListenerError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }
}

/// Why a matched webhook request was rejected.
///
/// The display strings are part of the wire contract: they are sent back to
/// GitLab verbatim in the `error` field of the 400 response.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("No token found in the request")]
    MissingToken,

    #[error("No event found in the request")]
    MissingEvent,

    #[error("Make sure body-parser is used")]
    MissingBody,

    #[error("Failed to verify secret")]
    SecretMismatch,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::MissingToken => "MissingToken",
            RejectionReason::MissingEvent => "MissingEvent",
            RejectionReason::MissingBody => "MissingBody",
            RejectionReason::SecretMismatch => "SecretMismatch",
        }
    }

    pub fn http_status(&self) -> u16 {
        400
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            RejectionReason::MissingToken.to_string(),
            "No token found in the request"
        );
        assert_eq!(
            RejectionReason::MissingEvent.to_string(),
            "No event found in the request"
        );
        assert_eq!(
            RejectionReason::MissingBody.to_string(),
            "Make sure body-parser is used"
        );
        assert_eq!(
            RejectionReason::SecretMismatch.to_string(),
            "Failed to verify secret"
        );
        assert_eq!(RejectionReason::SecretMismatch.http_status(), 400);
    }

    #[test]
    fn test_listener_error_display() {
        let err = Error::Listener {
            channel: "push".to_string(),
            source: "boom".into(),
        };
        assert_eq!(err.to_string(), "Subscriber on channel 'push' failed: boom");
        assert_eq!(err.code(), "ListenerError");
    }
}
