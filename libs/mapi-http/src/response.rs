use crate::error::HttpError;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Bytes of a failed response kept for [`HttpError::HttpStatus`]
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Response body after decompression, boxed.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// A response whose status has not been judged yet.
///
/// `checked_bytes`, `json` and `text` turn a non-2xx status into
/// [`HttpError::HttpStatus`] carrying a preview of the body; `bytes` reads the
/// body whatever the status. Every read stops at `max_body_size`.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Numeric header such as the paging `total`; `None` if absent or not a number.
    #[must_use]
    pub fn header_u64(&self, name: &str) -> Option<u64> {
        let raw = self.inner.headers().get(name)?.to_str().ok()?;
        raw.trim().parse().ok()
    }

    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Status check that leaves the body unread.
    ///
    /// # Errors
    /// `HttpError::HttpStatus` with an empty preview for a non-2xx status.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        let status = self.inner.status();
        if status.is_success() {
            Ok(self)
        } else {
            Err(HttpError::HttpStatus {
                status,
                body_preview: String::new(),
                content_type: content_type(self.inner.headers()),
            })
        }
    }

    /// Body bytes, whatever the status.
    ///
    /// # Errors
    /// `HttpError::BodyTooLarge` past `max_body_size`.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        collect_capped(self.inner.into_body(), self.max_body_size).await
    }

    /// Body bytes of a 2xx response.
    ///
    /// # Errors
    /// `HttpError::HttpStatus` for any other status, `HttpError::BodyTooLarge`
    /// past `max_body_size`.
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        success_body(self.inner, self.max_body_size).await
    }

    /// Deserialize the body of a 2xx response.
    ///
    /// # Errors
    /// As [`checked_bytes`](Self::checked_bytes), plus `HttpError::Json`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = success_body(self.inner, self.max_body_size).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Body of a 2xx response as lossy UTF-8.
    ///
    /// # Errors
    /// As [`checked_bytes`](Self::checked_bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let body = success_body(self.inner, self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(http::header::CONTENT_TYPE)?;
    value.to_str().ok().map(str::to_owned)
}

async fn success_body(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let (parts, body) = response.into_parts();
    if parts.status.is_success() {
        return collect_capped(body, max_body_size).await;
    }

    // The status must survive an oversized error page.
    let cap = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    let body_preview = match collect_capped(body, cap).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
        Err(other) => return Err(other),
    };
    Err(HttpError::HttpStatus {
        status: parts.status,
        body_preview,
        content_type: content_type(&parts.headers),
    })
}

async fn collect_capped(body: ResponseBody, cap: usize) -> Result<Bytes, HttpError> {
    let mut buf = BytesMut::new();
    let mut body = std::pin::pin!(body);
    while let Some(frame) = body.frame().await.transpose().map_err(HttpError::Transport)? {
        let Ok(chunk) = frame.into_data() else {
            continue;
        };
        let actual = buf.len() + chunk.len();
        if actual > cap {
            return Err(HttpError::BodyTooLarge { limit: cap, actual });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
