/// Error types for the Circl inbox client.
/// Every failure in this crate degrades to "state did not update this cycle";
/// nothing here is fatal to the process.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned {status} for {context}")]
    Server { status: u16, context: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl ClientError {
    pub(crate) fn server(status: reqwest::StatusCode, context: &str) -> Self {
        ClientError::Server {
            status: status.as_u16(),
            context: context.to_string(),
        }
    }

    /// True for failures a background refresh should log and ride out
    /// until the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::Server { .. } | ClientError::Decode(_)
        )
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("Invalid URL: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
