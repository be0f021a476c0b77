//! Stream-token error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamTokenError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No asset selected")]
    NoAsset,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest_middleware::Error> for StreamTokenError {
    fn from(err: reqwest_middleware::Error) -> Self {
        StreamTokenError::Network(err.to_string())
    }
}

impl From<reqwest::Error> for StreamTokenError {
    fn from(err: reqwest::Error) -> Self {
        StreamTokenError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StreamTokenError>;
