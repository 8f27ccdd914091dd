use crate::cache::ResponseCache;
use crate::credentials::Credentials;
use crate::error::ApiError;
use crate::settings::{ClientSettings, ThrottleSettings};
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::upload::{ImageProcessor, PassthroughProcessor, Uploader};
use mapi_http::{HttpClientBuilder, HttpClientConfig, RetryPolicy, TransportSecurity};
use std::sync::Arc;

/// Entry point for every resource operation.
///
/// Holds the management API transport, the upload client, the credentials and
/// the retry presets. Cheap to clone; clones share one throttle window.
#[derive(Clone)]
pub struct ManagementClient {
    transport: Transport,
    uploader: Uploader,
    credentials: Credentials,
    images: Arc<dyn ImageProcessor>,
    burst: RetryPolicy,
    extended: RetryPolicy,
    max_per_page: u32,
}

impl std::fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementClient")
            .field("base_url", &self.transport.base_url())
            .field("credentials", &self.credentials)
            .field("max_per_page", &self.max_per_page)
            .finish_non_exhaustive()
    }
}

impl ManagementClient {
    #[must_use]
    pub fn builder(settings: ClientSettings) -> ManagementClientBuilder {
        ManagementClientBuilder::new(settings)
    }

    /// Build a client from settings alone; the token must be configured.
    ///
    /// # Errors
    /// Returns an error if the settings are invalid, no token is set or the
    /// HTTP clients cannot be built.
    pub fn from_settings(settings: ClientSettings) -> Result<Self, ApiError> {
        Self::builder(settings).build()
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    #[must_use]
    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub fn image_processor(&self) -> &dyn ImageProcessor {
        self.images.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> Option<&ResponseCache> {
        self.transport.cache()
    }

    /// Policy for ordinary reads and writes.
    #[must_use]
    pub fn burst_policy(&self) -> RetryPolicy {
        self.burst
    }

    /// Policy for asset registration.
    #[must_use]
    pub fn extended_policy(&self) -> RetryPolicy {
        self.extended
    }

    #[must_use]
    pub fn max_per_page(&self) -> u32 {
        self.max_per_page
    }

    /// `/{space_id}{suffix}`
    ///
    /// # Errors
    /// Returns `ApiError::MissingSpaceId` when no space id is configured.
    pub fn space_path(&self, suffix: &str) -> Result<String, ApiError> {
        let space_id = self.credentials.require_space_id()?;
        Ok(format!("/{space_id}{suffix}"))
    }

    /// Send a raw request through the management API transport.
    ///
    /// # Errors
    /// See [`Transport::send`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.transport.send(request).await
    }
}

/// Builder for [`ManagementClient`].
pub struct ManagementClientBuilder {
    settings: ClientSettings,
    credentials: Option<Credentials>,
    transport: TransportSecurity,
    images: Option<Arc<dyn ImageProcessor>>,
}

impl ManagementClientBuilder {
    #[must_use]
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            settings,
            credentials: None,
            transport: TransportSecurity::TlsOnly,
            images: None,
        }
    }

    /// Use these credentials instead of the token and space id from settings.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Transport security for both the API and the storage client.
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn image_processor(mut self, images: Arc<dyn ImageProcessor>) -> Self {
        self.images = Some(images);
        self
    }

    /// # Errors
    /// Returns `ApiError::InvalidConfig` for out-of-range settings or a
    /// missing token, and `ApiError::Http` if an HTTP client fails to build.
    pub fn build(self) -> Result<ManagementClient, ApiError> {
        let settings = self.settings;
        settings.validate()?;
        let credentials = match self.credentials {
            Some(credentials) => credentials,
            None => settings.credentials()?,
        };

        let api_config = HttpClientConfig {
            request_timeout: settings.request_timeout(),
            throttle: Some(settings.throttle.to_config()),
            transport: self.transport,
            ..HttpClientConfig::default()
        };
        let http = HttpClientBuilder::with_config(api_config)
            .bearer_token(credentials.api_token().clone())
            .build()?;

        let storage_config = HttpClientConfig {
            throttle: settings.upload_throttle.map(ThrottleSettings::to_config),
            transport: self.transport,
            ..HttpClientConfig::storage()
        };
        let storage = HttpClientBuilder::with_config(storage_config).build()?;

        let cache = settings
            .cache
            .enabled
            .then(|| ResponseCache::new(settings.cache.auto_invalidate));

        tracing::debug!(
            base_url = %settings.base_url,
            space_id = ?credentials.space_id(),
            calls_per_interval = settings.throttle.calls_per_interval,
            interval_ms = settings.throttle.interval_ms,
            cache = cache.is_some(),
            "management client ready"
        );

        Ok(ManagementClient {
            transport: Transport::new(http, &settings.base_url, cache),
            uploader: Uploader::new(storage, settings.retry.upload.to_policy()),
            credentials,
            images: self
                .images
                .unwrap_or_else(|| Arc::new(PassthroughProcessor)),
            burst: settings.retry.burst.to_policy(),
            extended: settings.retry.extended.to_policy(),
            max_per_page: settings.max_per_page,
        })
    }
}


#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::test_support::{SPACE_ID, client, settings};
    use super::*;
    use httpmock::prelude::*;
    use secrecy::SecretString;

    #[tokio::test]
    async fn space_path_requires_space_id() {
        let server = MockServer::start();
        let client = ManagementClient::builder(settings(&server))
            .credentials(Credentials::new(SecretString::from("t"), None))
            .transport(TransportSecurity::AllowInsecureHttp)
            .build()
            .unwrap();
        assert!(matches!(
            client.space_path("/stories"),
            Err(ApiError::MissingSpaceId)
        ));
    }

    #[tokio::test]
    async fn requests_carry_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/v1/spaces/12345")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(serde_json::json!({ "space": { "id": SPACE_ID } }));
        });

        let client = client(&server);
        assert_eq!(client.space_path("").unwrap(), "/12345");
        let resp = client
            .send(ApiRequest::get(client.space_path("").unwrap()))
            .await
            .unwrap();
        assert_eq!(mock.calls(), 1);
        assert_eq!(resp.take("space").unwrap()["id"], SPACE_ID);
    }

    #[tokio::test]
    async fn missing_token_fails_build() {
        let server = MockServer::start();
        let settings = ClientSettings {
            api_token: None,
            ..settings(&server)
        };
        let err = ManagementClient::builder(settings).build().unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn debug_redacts_token_and_presets_follow_settings() {
        let server = MockServer::start();
        let client = client(&server);
        assert!(!format!("{client:?}").contains("test-token"));
        assert_eq!(client.burst_policy().retries, 2);
        assert_eq!(client.extended_policy().retries, 3);
        assert_eq!(client.uploader().policy().retries, 1);
        assert!(client.cache().is_none());
    }
}
