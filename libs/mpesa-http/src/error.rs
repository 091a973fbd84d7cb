use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Why a request URL was refused before any I/O happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    ParseError,
    MissingAuthority,
    MissingScheme,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// No response headers within the configured request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The peer was never reached: DNS, refused socket or failed handshake.
    #[error("Connection failed: {0}")]
    Connect(#[source] BoxError),

    /// The connection broke after it was established.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),

    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `reason` is free text for logs; branch on `kind`.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// `true` when the request never reached the gateway.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        if err.is_connect() {
            Self::Connect(Box::new(err))
        } else {
            Self::Transport(Box::new(err))
        }
    }
}
