//! Tower layers composed by [`crate::HttpClientBuilder`].
//!
//! - [`RetryLayer`] - replays transient failures per the request's [`crate::RetryPolicy`]
//! - [`ThrottleLayer`] - admits attempts through a sliding-window [`crate::Throttle`]
//! - [`BearerAuthLayer`] - injects `Authorization: Bearer <token>`
//! - [`DefaultHeadersLayer`] - fills in `User-Agent` and `Accept`

mod bearer;
mod default_headers;
mod retry;
mod throttle;

pub use bearer::{BearerAuthLayer, BearerAuthService};
pub use default_headers::{DefaultHeadersLayer, DefaultHeadersService};
pub use retry::{RetryLayer, RetryService};
pub use throttle::{ThrottleLayer, ThrottleService};
