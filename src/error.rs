//! Unified error handling for vaultsync
//!
//! Every failure propagates as a `SyncError` to the binary entry point,
//! which logs it and exits non-zero. Library code never terminates the
//! process itself.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration errors (bad arguments, unreadable client secret)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Authentication errors (code exchange, token cache I/O, refresh)
    #[error("Authentication error: {message}")]
    Auth {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Remote API errors (Drive list/create/update failures)
    #[error("Remote API error: {message}")]
    Remote {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Local data errors (unreadable or empty local file)
    #[error("Local data error: {message} (path: {path})")]
    LocalData {
        message: String,
        path: String,
        source: Option<BoxedSource>,
    },
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            source: None,
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            source: None,
        }
    }

    pub fn local_data(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::LocalData {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }

    pub fn io(err: io::Error, path: impl Into<String>) -> Self {
        Self::LocalData {
            message: format!("I/O failure: {err}"),
            path: path.into(),
            source: Some(Box::new(err)),
        }
    }

    pub fn token_cache(err: io::Error) -> Self {
        Self::Auth {
            message: format!("Token cache I/O failure: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote {
            message: format!("HTTP request failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            message: format!("JSON error: {err}"),
            source: Some(Box::new(err)),
        }
    }
}
