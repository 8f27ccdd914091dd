use crate::client::{BufferedService, HttpClient};
use crate::config::{HttpClientConfig, ThrottleConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::{BearerAuthLayer, DefaultHeadersLayer, RetryLayer, ThrottleLayer};
use crate::response::ResponseBody;
use crate::throttle::Throttle;
use crate::tls;
use bytes::Bytes;
use http::header::{ACCEPT, USER_AGENT};
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use secrecy::SecretString;
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Boxed stack between two optional layers
type StackService = BoxCloneService<Request<Full<Bytes>>, Response<ResponseBody>, HttpError>;

/// Configures and assembles an [`HttpClient`].
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    bearer_token: Option<SecretString>,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    /// Start from a preset such as [`HttpClientConfig::storage`].
    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            bearer_token: None,
        }
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// `None` disables throttling. The built client owns a fresh window.
    #[must_use]
    pub fn throttle(mut self, throttle: Option<ThrottleConfig>) -> Self {
        self.config.throttle = throttle;
        self
    }

    /// Send `Authorization: Bearer <token>` on every request.
    #[must_use]
    pub fn bearer_token(mut self, token: SecretString) -> Self {
        self.bearer_token = Some(token);
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.config.max_body_size = limit;
        self
    }

    /// `AllowInsecureHttp` is meant for local mock servers.
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Requests allowed to queue for the buffer worker, at least 1.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    /// Assemble the middleware stack.
    ///
    /// Outer to inner: buffer, retry, throttle, bearer auth, per-attempt
    /// timeout, default headers, decompression, hyper. Throttle and auth sit
    /// inside the retry loop so every attempt takes a window slot; the
    /// attempt timeout starts only after that slot is granted.
    ///
    /// # Errors
    /// Returns an error if TLS setup fails or a header value is invalid.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let config = self.config;
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!("plain HTTP allowed; this client must only talk to mock servers");
        }

        let connector = https_connector(config.tls_roots, config.transport)?;
        let mut pool = Client::builder(TokioExecutor::new());
        // idle connections are only reaped with a pool timer installed
        pool.pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout);
        let hyper_client = pool.build::<_, Full<Bytes>>(connector);

        let default_headers = DefaultHeadersLayer::try_new([
            (USER_AGENT, config.user_agent.as_str()),
            (ACCEPT, "application/json"),
        ])?;

        let attempt_timeout = config.request_timeout;
        let mut stack: StackService = ServiceBuilder::new()
            .layer(TimeoutLayer::new(attempt_timeout))
            .layer(default_headers)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(box_response_body)
            .map_err(move |err: tower::BoxError| classify_stack_error(err, attempt_timeout))
            .boxed_clone();

        if let Some(token) = &self.bearer_token {
            stack = BearerAuthLayer::try_new(token)?.layer(stack).boxed_clone();
        }
        if let Some(window) = config.throttle {
            stack = ThrottleLayer::new(Throttle::from_config(window))
                .layer(stack)
                .boxed_clone();
        }
        let stack = RetryLayer::new().layer(stack).boxed_clone();

        let service: BufferedService = Buffer::new(stack, config.buffer_capacity.max(1));
        Ok(HttpClient {
            service,
            max_body_size: config.max_body_size,
            transport_security: config.transport,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An elapsed attempt becomes `Timeout`; typed errors from inner layers are
/// unboxed; anything else is a transport failure.
fn classify_stack_error(err: tower::BoxError, attempt_timeout: Duration) -> HttpError {
    if err.is::<Elapsed>() {
        return HttpError::Timeout(attempt_timeout);
    }
    err.downcast::<HttpError>()
        .map_or_else(HttpError::Transport, |typed| *typed)
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}

/// Connector for the chosen root store, advertising h2 and http/1.1.
fn https_connector(
    roots: TlsRootConfig,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let with_roots = match roots {
        TlsRootConfig::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(tls::crypto_provider())
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => {
            HttpsConnectorBuilder::new().with_tls_config(tls::native_roots_client_config()?)
        }
    };
    let with_schemes = match transport {
        TransportSecurity::TlsOnly => with_roots.https_only(),
        TransportSecurity::AllowInsecureHttp => with_roots.https_or_http(),
    };
    Ok(with_schemes.enable_all_versions().build())
}
