use crate::error::HttpError;
use crate::throttle::Throttle;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// Tower layer that admits every request through a [`Throttle`].
///
/// Placed inside the retry layer, so retried attempts consume budget too.
#[derive(Clone, Debug)]
pub struct ThrottleLayer {
    throttle: Throttle,
}

impl ThrottleLayer {
    #[must_use]
    pub fn new(throttle: Throttle) -> Self {
        Self { throttle }
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = ThrottleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrottleService {
            inner,
            throttle: self.throttle.clone(),
        }
    }
}

/// Service created by [`ThrottleLayer`].
///
/// Waiting happens inside the response future, never in `poll_ready`, so a
/// full window does not stall the buffer worker.
#[derive(Clone, Debug)]
pub struct ThrottleService<S> {
    inner: S,
    throttle: Throttle,
}

impl<S, Req> Service<Req> for ThrottleService<S>
where
    S: Service<Req, Error = HttpError> + Clone + Send + 'static,
    S::Future: Send,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, HttpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let throttle = self.throttle.clone();

        Box::pin(async move {
            throttle.acquire().await;
            inner.ready().await?;
            inner.call(req).await
        })
    }
}
