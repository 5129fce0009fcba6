//! Error types for Spotify authorization and API operations

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Timed out after {0:?} waiting for the authorization callback")]
    AuthorizationTimeout(Duration),

    #[error("API request failed with status {status}: {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Refusing to send credentials outside the API base URL: {0}")]
    ForeignUrl(String),

    #[error("Client has been closed")]
    Closed,
}

impl Error {
    pub(crate) fn invalid_config(reason: impl std::fmt::Display) -> Self {
        Error::Authorization(format!("Invalid configuration: {reason}"))
    }

    /// HTTP status of a failed API call, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
