//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No wallet available")]
    NoWallet,

    #[error("Nonce request failed: {0}")]
    NonceRequest(String),

    #[error("Signature request failed: {0}")]
    Signature(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest_middleware::Error> for SessionError {
    fn from(err: reqwest_middleware::Error) -> Self {
        SessionError::Network(err.to_string())
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Network(err.to_string())
    }
}

impl SessionError {
    /// True when the failure means "could not reach the server", as
    /// opposed to the server rejecting us. Session validation treats
    /// the former as advisory and keeps local state.
    pub fn is_network(&self) -> bool {
        matches!(self, SessionError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_count_as_network() {
        assert!(SessionError::Network("refused".into()).is_network());
        assert!(!SessionError::Server {
            status: 401,
            message: "expired".into(),
        }
        .is_network());
        assert!(!SessionError::NoWallet.is_network());
    }
}
