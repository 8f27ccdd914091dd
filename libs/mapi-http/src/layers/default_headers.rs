use crate::error::HttpError;
use http::header::HeaderName;
use http::{HeaderValue, Request};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that fills in headers the caller did not set.
///
/// Used for `User-Agent` and `Accept`; a header already present on the
/// request is left untouched.
#[derive(Clone, Debug)]
pub struct DefaultHeadersLayer {
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl DefaultHeadersLayer {
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if any value is not a valid
    /// header value.
    pub fn try_new<'a>(
        headers: impl IntoIterator<Item = (HeaderName, &'a str)>,
    ) -> Result<Self, HttpError> {
        let headers = headers
            .into_iter()
            .map(|(name, value)| Ok((name, HeaderValue::from_str(value)?)))
            .collect::<Result<Vec<_>, HttpError>>()?;
        Ok(Self {
            headers: headers.into(),
        })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

/// Service created by [`DefaultHeadersLayer`].
#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl<S, B> Service<Request<B>> for DefaultHeadersService<S>
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
        for (name, value) in self.headers.iter() {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}
