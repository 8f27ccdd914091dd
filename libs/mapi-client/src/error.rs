use mapi_http::HttpError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the management API client.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// Transport-level failure, including non-2xx statuses
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The response body lacks the expected envelope key
    #[error("response is missing the `{0}` field")]
    MissingField(&'static str),

    /// An operation scoped to a space was called without a space id
    #[error("no space id configured")]
    MissingSpaceId,

    /// A content node failed validation against its parent
    #[error("invalid content node: {0}")]
    InvalidNode(String),

    /// Settings could not be loaded
    #[error("configuration error: {0}")]
    Config(#[source] Box<figment::Error>),

    /// Settings were loaded but are out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading a local file failed
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image processor rejected its input
    #[error("image processing failed: {0}")]
    Image(String),
}

impl ApiError {
    /// HTTP status returned by the server, if the failure carried one.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            ApiError::Http(err) => err.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(http::StatusCode::NOT_FOUND)
    }
}

impl From<figment::Error> for ApiError {
    fn from(err: figment::Error) -> Self {
        ApiError::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Http(HttpError::Json(err))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn status_passes_through_from_http_errors() {
        let err = ApiError::from(HttpError::HttpStatus {
            status: http::StatusCode::NOT_FOUND,
            body_preview: String::new(),
            content_type: None,
        });
        assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
        assert!(err.is_not_found());

        assert_eq!(ApiError::MissingSpaceId.status(), None);
        assert!(!ApiError::MissingField("story").is_not_found());
    }

    #[test]
    fn http_display_is_transparent() {
        let err = ApiError::from(HttpError::ServiceClosed);
        assert_eq!(err.to_string(), HttpError::ServiceClosed.to_string());
    }
}
