use std::time::Duration;
use thiserror::Error;

/// Why a request URL was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed
    ParseError,
    /// URL has no host
    MissingAuthority,
    /// URL has no scheme
    MissingScheme,
}

/// Errors produced by the management API transport.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("could not build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// One attempt exceeded the per-attempt timeout
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// No response: DNS, connect or connection reset
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("TLS setup failed: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("response body of {actual} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize, actual: usize },

    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The buffer worker is gone
    #[error("request worker stopped")]
    ServiceClosed,

    /// `reason` is for logs; match on `kind`.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    #[error("scheme '{scheme}' rejected: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    /// Status code carried by an [`HttpError::HttpStatus`], if any.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            HttpError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when no response was received at all (connection failure or timeout).
    #[must_use]
    pub fn is_no_response(&self) -> bool {
        matches!(self, HttpError::Transport(_) | HttpError::Timeout(_))
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}
