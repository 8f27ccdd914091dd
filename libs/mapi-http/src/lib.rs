#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for the content management API
//!
//! A hyper-based client behind a tower middleware stack:
//! - TLS via rustls (HTTPS only unless explicitly relaxed for tests)
//! - `Authorization: Bearer <token>` injection
//! - Throttle: at most N request starts in any interval-long window, FIFO
//! - Opt-in retry of transient failures (429, 5xx, transport errors,
//!   timeouts) with linearly growing, jittered delays
//! - Per-attempt timeouts and transparent response decompression
//!
//! Retry is configured per request, not per client:
//!
//! ```ignore
//! use mapi_http::{HttpClient, RetryPolicy};
//!
//! let client = HttpClient::builder()
//!     .bearer_token(token)
//!     .build()?;
//!
//! let stories: serde_json::Value = client
//!     .get("https://mapi.storyblok.com/v1/spaces/12345/stories")
//!     .query([("page", "1"), ("per_page", "100")])
//!     .retry(Some(RetryPolicy::burst()))
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
pub mod multipart;
mod request;
mod response;
pub mod retry;
pub mod throttle;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    DEFAULT_CALLS_PER_INTERVAL, DEFAULT_THROTTLE_INTERVAL, DEFAULT_USER_AGENT, HttpClientConfig,
    ThrottleConfig, TlsRootConfig, TransportSecurity,
};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{
    BearerAuthLayer, BearerAuthService, DefaultHeadersLayer, DefaultHeadersService, RetryLayer,
    RetryService, ThrottleLayer, ThrottleService,
};
pub use multipart::MultipartForm;
pub use request::RequestBuilder;
pub use response::{HttpResponse, ResponseBody};
pub use retry::{RetryPolicy, is_transient_status, retry_async, retry_delay};
pub use throttle::{Throttle, Throttled};
