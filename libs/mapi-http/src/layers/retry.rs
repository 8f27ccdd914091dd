use crate::error::HttpError;
use crate::response::ResponseBody;
use crate::retry::RetryPolicy;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// Upper bound of bytes read from a discarded response before retrying
const RETRY_DRAIN_LIMIT: usize = 64 * 1024;

/// Tower layer that retries transient failures.
///
/// The layer has no policy of its own: a request is retried only when it
/// carries a [`RetryPolicy`] in its extensions. Every request gets its own
/// retry counter, so concurrent requests never affect each other's budget.
#[derive(Clone, Debug, Default)]
pub struct RetryLayer;

impl RetryLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService { inner }
    }
}

/// Service that replays a request while its [`RetryPolicy`] allows.
///
/// A transient status that survives the whole budget is handed back as
/// `Ok(Response)`; a transport error or timeout that survives it is handed
/// back as `Err`. Terminal statuses are returned after the first attempt.
#[derive(Clone, Debug)]
pub struct RetryService<S> {
    inner: S,
}

impl<S> Service<Request<Full<Bytes>>> for RetryService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Swap so we consume the instance that was poll_ready'd,
        // leaving a fresh clone for the next poll_ready cycle.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let Some(policy) = req.extensions().get::<RetryPolicy>().copied() else {
            return Box::pin(async move { inner.call(req).await });
        };

        let (parts, body) = req.into_parts();

        Box::pin(async move {
            let method = parts.method.clone();
            let path = parts.uri.path().to_owned();

            let mut retry_count = 0u32;
            loop {
                let req = Request::from_parts(parts.clone(), body.clone());

                let mut svc = inner.clone();
                svc.ready().await?;

                match svc.call(req).await {
                    Ok(resp) => {
                        let status = resp.status();
                        if !policy.should_retry_status(status) {
                            return Ok(resp);
                        }
                        if retry_count >= policy.retries {
                            tracing::warn!(
                                method = %method,
                                path = %path,
                                status = status.as_u16(),
                                attempts = retry_count.saturating_add(1),
                                "retry threshold reached"
                            );
                            return Ok(resp);
                        }

                        if let Err(e) = drain_response_body(resp, RETRY_DRAIN_LIMIT).await {
                            tracing::debug!(
                                error = %e,
                                "Failed to drain response body before retry"
                            );
                        }

                        retry_count += 1;
                        let delay = policy.delay_for(retry_count);
                        tracing::debug!(
                            retry = retry_count,
                            retries = policy.retries,
                            status = status.as_u16(),
                            method = %method,
                            path = %path,
                            delay_ms = delay.as_millis(),
                            "Retrying request after status code"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => {
                        if !policy.should_retry_error(&err) {
                            return Err(err);
                        }
                        if retry_count >= policy.retries {
                            tracing::warn!(
                                method = %method,
                                path = %path,
                                error = %err,
                                attempts = retry_count.saturating_add(1),
                                "retry threshold reached"
                            );
                            return Err(err);
                        }

                        retry_count += 1;
                        let delay = policy.delay_for(retry_count);
                        tracing::debug!(
                            retry = retry_count,
                            retries = policy.retries,
                            error = %err,
                            method = %method,
                            path = %path,
                            delay_ms = delay.as_millis(),
                            "Retrying request after error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        })
    }
}

/// Read and discard up to `limit` bytes so the connection can be reused.
async fn drain_response_body(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<(), HttpError> {
    let (_parts, body) = response.into_parts();
    let mut body = std::pin::pin!(body);
    let mut drained = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            drained += chunk.len();
            if drained >= limit {
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Script = Arc<dyn Fn(&str, usize) -> Result<StatusCode, HttpError> + Send + Sync>;

    fn make_response_body(data: &[u8]) -> ResponseBody {
        let body = Full::new(Bytes::from(data.to_vec()));
        body.map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })
            .boxed()
    }

    /// Answers each path according to `script(path, attempt_index)` and
    /// counts calls per path.
    #[derive(Clone)]
    struct ScriptedService {
        calls: Arc<Mutex<HashMap<String, usize>>>,
        script: Script,
    }

    impl ScriptedService {
        fn new(
            script: impl Fn(&str, usize) -> Result<StatusCode, HttpError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Arc::new(Mutex::new(HashMap::new())),
                script: Arc::new(script),
            }
        }

        fn calls(&self, path: &str) -> usize {
            self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
        }
    }

    impl Service<Request<Full<Bytes>>> for ScriptedService {
        type Response = Response<ResponseBody>;
        type Error = HttpError;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let path = req.uri().path().to_owned();
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(path.clone()).or_insert(0);
                *entry += 1;
                *entry - 1
            };
            let outcome = (self.script)(&path, attempt);
            Box::pin(async move {
                let status = outcome?;
                Ok(Response::builder()
                    .status(status)
                    .body(make_response_body(b"{}"))
                    .unwrap())
            })
        }
    }

    fn request(path: &str, policy: Option<RetryPolicy>) -> Request<Full<Bytes>> {
        let mut req = Request::builder()
            .method(Method::GET)
            .uri(format!("http://mapi.test{path}"))
            .body(Full::new(Bytes::new()))
            .unwrap();
        if let Some(policy) = policy {
            req.extensions_mut().insert(policy);
        }
        req
    }

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(10)).with_max_jitter(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn request_without_policy_is_attempted_once() {
        let inner = ScriptedService::new(|_, _| Ok(StatusCode::INTERNAL_SERVER_ERROR));
        let mut svc = RetryLayer::new().layer(inner.clone());

        let resp = svc.call(request("/spaces/1/stories", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(inner.calls("/spaces/1/stories"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_statuses_are_not_retried() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
        ] {
            let inner = ScriptedService::new(move |_, _| Ok(status));
            let mut svc = RetryLayer::new().layer(inner.clone());

            let resp = svc.call(request("/s", Some(fast_policy(5)))).await.unwrap();
            assert_eq!(resp.status(), status);
            assert_eq!(inner.calls("/s"), 1, "status {status}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_statuses_are_retried_until_success() {
        let inner = ScriptedService::new(|_, attempt| match attempt {
            0 => Ok(StatusCode::TOO_MANY_REQUESTS),
            1 | 2 => Ok(StatusCode::INTERNAL_SERVER_ERROR),
            _ => Ok(StatusCode::OK),
        });
        let mut svc = RetryLayer::new().layer(inner.clone());

        let resp = svc.call(request("/s", Some(fast_policy(5)))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(inner.calls("/s"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_status_is_returned_after_budget() {
        let inner = ScriptedService::new(|_, _| Ok(StatusCode::SERVICE_UNAVAILABLE));
        let mut svc = RetryLayer::new().layer(inner.clone());

        let resp = svc.call(request("/s", Some(fast_policy(3)))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(inner.calls("/s"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_then_surfaced() {
        let inner =
            ScriptedService::new(|_, _| Err(HttpError::Transport("connection reset".into())));
        let mut svc = RetryLayer::new().layer(inner.clone());

        let err = svc
            .call(request("/s", Some(fast_policy(2))))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));
        assert_eq!(inner.calls("/s"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_count_as_transient() {
        let inner = ScriptedService::new(|_, attempt| {
            if attempt == 0 {
                Err(HttpError::Timeout(Duration::from_secs(30)))
            } else {
                Ok(StatusCode::CREATED)
            }
        });
        let mut svc = RetryLayer::new().layer(inner.clone());

        let resp = svc.call(request("/s", Some(fast_policy(1)))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(inner.calls("/s"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_keep_separate_budgets() {
        let inner = ScriptedService::new(|path, attempt| match path {
            "/always-failing" => Ok(StatusCode::INTERNAL_SERVER_ERROR),
            _ if attempt < 2 => Ok(StatusCode::BAD_GATEWAY),
            _ => Ok(StatusCode::OK),
        });
        let svc = RetryLayer::new().layer(inner.clone());

        let mut a = svc.clone();
        let mut b = svc.clone();
        let mut c = svc;
        let (ra, rb, rc) = tokio::join!(
            a.call(request("/always-failing", Some(fast_policy(1)))),
            b.call(request("/flaky", Some(fast_policy(7)))),
            c.call(request("/unguarded", None)),
        );

        assert_eq!(ra.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rb.unwrap().status(), StatusCode::OK);
        assert_eq!(rc.unwrap().status(), StatusCode::BAD_GATEWAY);
        assert_eq!(inner.calls("/always-failing"), 2);
        assert_eq!(inner.calls("/flaky"), 3);
        assert_eq!(inner.calls("/unguarded"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_scales_with_retry_count() {
        let inner = ScriptedService::new(|_, _| Ok(StatusCode::TOO_MANY_REQUESTS));
        let mut svc = RetryLayer::new().layer(inner.clone());
        let policy =
            RetryPolicy::new(3, Duration::from_millis(100)).with_max_jitter(Duration::ZERO);

        let start = tokio::time::Instant::now();
        let _ = svc.call(request("/s", Some(policy))).await.unwrap();

        // 100 + 200 + 300 ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(600), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(700), "{elapsed:?}");
    }
}
