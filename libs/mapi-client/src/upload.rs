//! Signed uploads to asset storage and the image processing seam.

use crate::error::ApiError;
use async_trait::async_trait;
use bytes::Bytes;
use mapi_http::{HttpClient, MultipartForm, RetryPolicy, retry_async};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Signed upload target returned when an asset is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSigningResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub pretty_url: String,
    #[serde(default)]
    pub public_url: String,
    /// Form fields the storage host expects verbatim
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub post_url: String,
}

impl AssetSigningResponse {
    fn filename(&self) -> &str {
        self.pretty_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("file")
    }

    fn content_type(&self) -> mime::Mime {
        self.fields
            .get("Content-Type")
            .and_then(|value| value.parse().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
    }
}

/// Turns a local file into the bytes that get uploaded.
///
/// Resizing and compression live outside this crate; implementations only
/// have to hand back the final bytes.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn process(
        &self,
        path: &Path,
        compress: bool,
        dimension_limit: Option<u32>,
    ) -> Result<Bytes, ApiError>;
}

/// Uploads files unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

#[async_trait]
impl ImageProcessor for PassthroughProcessor {
    async fn process(
        &self,
        path: &Path,
        compress: bool,
        dimension_limit: Option<u32>,
    ) -> Result<Bytes, ApiError> {
        if compress || dimension_limit.is_some() {
            tracing::debug!(
                path = %path.display(),
                compress,
                ?dimension_limit,
                "no image processor configured; uploading original bytes"
            );
        }
        let data = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Bytes::from(data))
    }
}

/// Posts signed multipart uploads to the storage host.
///
/// Uses its own client: the storage host is not the management API, gets no
/// bearer token and has its own throttle budget.
#[derive(Debug, Clone)]
pub struct Uploader {
    http: HttpClient,
    policy: RetryPolicy,
}

impl Uploader {
    #[must_use]
    pub fn new(http: HttpClient, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Upload `buffer` to `signed.post_url` and return the asset's pretty URL.
    ///
    /// Every attempt resubmits the whole form.
    ///
    /// # Errors
    /// Returns the last error once the upload retry budget is exhausted, or
    /// the first terminal error.
    pub async fn upload(
        &self,
        buffer: Bytes,
        signed: &AssetSigningResponse,
    ) -> Result<String, ApiError> {
        let form = signed
            .fields
            .iter()
            .fold(MultipartForm::new(), |form, (name, value)| form.text(name, value))
            .file("file", signed.filename(), signed.content_type(), buffer);

        let http = &self.http;
        let form = &form;
        let post_url = signed.post_url.as_str();
        retry_async(&self.policy, "asset upload", move || async move {
            http.post(post_url)
                .multipart(form)
                .send()
                .await?
                .checked_bytes()
                .await
        })
        .await?;

        tracing::debug!(pretty_url = %signed.pretty_url, "asset uploaded");
        Ok(signed.pretty_url.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use mapi_http::{HttpClientBuilder, HttpClientConfig};
    use std::io::Write;
    use std::time::Duration;

    fn uploader(retries: u32) -> Uploader {
        let http = HttpClientBuilder::with_config(HttpClientConfig::for_testing())
            .build()
            .unwrap();
        let policy = RetryPolicy::new(retries, Duration::from_millis(5))
            .with_max_jitter(Duration::from_millis(1));
        Uploader::new(http, policy)
    }

    fn signed(server: &MockServer) -> AssetSigningResponse {
        AssetSigningResponse {
            id: Some(77),
            pretty_url: "//a.example.com/f/12345/800x600/abc/photo.png".to_owned(),
            public_url: "https://s3.example.com/a.example.com/f/12345/photo.png".to_owned(),
            fields: BTreeMap::from([
                ("key".to_owned(), "f/12345/photo.png".to_owned()),
                ("Content-Type".to_owned(), "image/png".to_owned()),
                ("policy".to_owned(), "eyJleHBpcmF0aW9u".to_owned()),
            ]),
            post_url: server.url("/upload"),
        }
    }

    #[tokio::test]
    async fn posts_fields_and_file() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/upload")
                .header_exists("content-type")
                .header_missing("authorization")
                .body_includes("name=\"key\"\r\n\r\nf/12345/photo.png")
                .body_includes("name=\"policy\"\r\n\r\neyJleHBpcmF0aW9u")
                .body_includes("name=\"file\"; filename=\"photo.png\"")
                .body_includes("Content-Type: image/png")
                .body_includes("PNGDATA");
            then.status(204);
        });

        let url = uploader(0)
            .upload(Bytes::from_static(b"PNGDATA"), &signed(&server))
            .await
            .unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(url, "//a.example.com/f/12345/800x600/abc/photo.png");
    }

    #[tokio::test]
    async fn exhausted_upload_returns_last_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::POST).path("/upload");
            then.status(503).body("SlowDown");
        });

        let err = uploader(2)
            .upload(Bytes::from_static(b"data"), &signed(&server))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 3);
        assert_eq!(err.status(), Some(http::StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn forbidden_upload_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::POST).path("/upload");
            then.status(403).body("Policy expired");
        });

        let err = uploader(5)
            .upload(Bytes::from_static(b"data"), &signed(&server))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 1);
        assert_eq!(err.status(), Some(http::StatusCode::FORBIDDEN));
    }

    #[test]
    fn signing_response_parses_and_derives_file_metadata() {
        let signed: AssetSigningResponse = serde_json::from_value(serde_json::json!({
            "id": 9,
            "pretty_url": "//a.example.com/f/1/doc.pdf",
            "fields": { "Content-Type": "application/pdf" },
            "post_url": "https://s3.example.com/bucket"
        }))
        .unwrap();
        assert_eq!(signed.filename(), "doc.pdf");
        assert_eq!(signed.content_type(), mime::APPLICATION_PDF);
        assert!(signed.public_url.is_empty());

        let bare = AssetSigningResponse {
            pretty_url: "//a.example.com/".to_owned(),
            fields: BTreeMap::new(),
            ..signed
        };
        assert_eq!(bare.filename(), "file");
        assert_eq!(bare.content_type(), mime::APPLICATION_OCTET_STREAM);
    }

    #[tokio::test]
    async fn passthrough_reads_file_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"raw image").unwrap();

        let bytes = PassthroughProcessor
            .process(file.path(), true, Some(1200))
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"raw image"));

        let err = PassthroughProcessor
            .process(Path::new("/nonexistent/image.png"), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Io { .. }));
    }
}
