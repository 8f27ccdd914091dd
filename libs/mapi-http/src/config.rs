use std::time::Duration;

/// Sent unless the caller sets its own `User-Agent`
pub const DEFAULT_USER_AGENT: &str = concat!("mapi-http/", env!("CARGO_PKG_VERSION"));

/// Default number of calls allowed to start inside one throttle window
pub const DEFAULT_CALLS_PER_INTERVAL: usize = 3;

/// Default throttle window length
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Sliding-window throttle settings.
///
/// At most `calls_per_interval` requests start inside any `interval`-long
/// window. Callers above the budget wait; nothing is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub calls_per_interval: usize,
    pub interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            calls_per_interval: DEFAULT_CALLS_PER_INTERVAL,
            interval: DEFAULT_THROTTLE_INTERVAL,
        }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub fn new(calls_per_interval: usize, interval: Duration) -> Self {
        Self {
            calls_per_interval,
            interval,
        }
    }
}

/// Where trusted root certificates come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Bundled Mozilla roots
    #[default]
    WebPki,
    /// The operating system store
    Native,
}

/// Whether plain `http://` URLs are accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only)
    #[default]
    TlsOnly,
    /// Allow plain HTTP (mock servers in tests only)
    AllowInsecureHttp,
}

/// Settings for one [`crate::HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-attempt timeout (default: 30 seconds)
    ///
    /// Every retry attempt gets its own timeout. An elapsed attempt counts as
    /// a transient failure.
    pub request_timeout: Duration,

    /// Largest response body read into memory (default: 10 MB)
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Throttle applied to every attempt (default: 3 calls per second)
    ///
    /// `None` disables throttling. Each built client owns its own window, so two
    /// clients never share a budget.
    pub throttle: Option<ThrottleConfig>,

    /// Default: `TlsOnly`
    pub transport: TransportSecurity,

    /// Default: `WebPki`
    pub tls_roots: TlsRootConfig,

    /// Requests queued for the buffer worker (default: 1024)
    ///
    /// Callers beyond the capacity wait for a free slot.
    pub buffer_capacity: usize,

    /// Timeout for idle pooled connections (default: 90 seconds)
    pub pool_idle_timeout: Option<Duration>,

    /// Idle keep-alive connections per host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10 MB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            throttle: Some(ThrottleConfig::default()),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Configuration for the asset storage endpoint.
    ///
    /// Uploads go to a different host than the management API, carry large
    /// bodies and are not throttled unless the caller opts in.
    #[must_use]
    pub fn storage() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            max_body_size: 1024 * 1024, // storage answers are small
            throttle: None,
            buffer_capacity: 64,
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }

    /// Configuration for tests against a local mock server.
    ///
    /// Plain HTTP, no throttle, short timeout.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            throttle: None,
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 64,
            ..Self::default()
        }
    }
}
