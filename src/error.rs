//! Error types for the fetch pipeline and its collaborators

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single NSE data call
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("NSE responded with HTTP {status}")]
    Status { status: StatusCode },
}

impl FetchError {
    /// The HTTP status behind this failure, when the endpoint answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Transport(e) => e.status(),
            FetchError::Status { status } => Some(*status),
        }
    }

    /// True when NSE rejected the session cookies (401/403).
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
        )
    }
}

/// Portfolio persistence and validation failures
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),
}

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Session {session_id} already subscribed to {topic}")]
    AlreadySubscribed { session_id: String, topic: String },

    #[error("Session {session_id} not subscribed to {topic}")]
    NotSubscribed { session_id: String, topic: String },

    #[error("Lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_expired_only_for_401_and_403() {
        assert!(FetchError::Status { status: StatusCode::UNAUTHORIZED }.is_auth_expired());
        assert!(FetchError::Status { status: StatusCode::FORBIDDEN }.is_auth_expired());
        assert!(!FetchError::Status { status: StatusCode::INTERNAL_SERVER_ERROR }.is_auth_expired());
        assert!(!FetchError::Status { status: StatusCode::NOT_FOUND }.is_auth_expired());
    }

    #[test]
    fn test_status_error_message_carries_code() {
        let err = FetchError::Status { status: StatusCode::FORBIDDEN };
        assert!(err.to_string().contains("403"));
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }
}
