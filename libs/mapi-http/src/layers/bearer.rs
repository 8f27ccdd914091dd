use crate::error::HttpError;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request};
use secrecy::{ExposeSecret, SecretString};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that sets `Authorization: Bearer <token>` on every request.
///
/// The header value is built once and flagged sensitive so it never shows up
/// in debug output.
#[derive(Clone)]
pub struct BearerAuthLayer {
    value: HeaderValue,
}

impl std::fmt::Debug for BearerAuthLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthLayer").finish_non_exhaustive()
    }
}

impl BearerAuthLayer {
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if the token contains bytes
    /// that are not allowed in a header.
    pub fn try_new(token: &SecretString) -> Result<Self, HttpError> {
        let raw = zeroize::Zeroizing::new(format!("Bearer {}", token.expose_secret()));
        let mut value = HeaderValue::from_str(&raw)?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            value: self.value.clone(),
        }
    }
}

/// Service created by [`BearerAuthLayer`].
#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    value: HeaderValue,
}

impl<S, B> Service<Request<B>> for BearerAuthService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        req.headers_mut().insert(AUTHORIZATION, self.value.clone());
        self.inner.call(req)
    }
}
