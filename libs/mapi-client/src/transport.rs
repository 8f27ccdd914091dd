use crate::cache::{CachedResponse, ResponseCache, cache_key};
use crate::error::ApiError;
use http::StatusCode;
use mapi_http::{HttpClient, RetryPolicy};
use serde_json::Value;

/// HTTP verbs used by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ApiMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMethod::Get => "GET",
            ApiMethod::Post => "POST",
            ApiMethod::Put => "PUT",
            ApiMethod::Delete => "DELETE",
        }
    }
}

/// A single management API call, relative to the base URL.
///
/// Built fresh for every call. The retry policy travels with the request, so
/// its counter never outlives it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: ApiMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub retry: Option<RetryPolicy>,
}

impl ApiRequest {
    fn new(method: ApiMethod, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
            retry: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Get, path, None)
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiMethod::Post, path, Some(body))
    }

    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiMethod::Put, path, Some(body))
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Delete, path, None)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Decoded 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Value of the `total` paging header
    pub total: Option<u64>,
    /// JSON body, `Value::Null` when the body was empty
    pub body: Value,
}

impl ApiResponse {
    /// Take the value under `key` out of the response envelope.
    ///
    /// # Errors
    /// Returns `ApiError::MissingField` if `key` is absent or null.
    pub fn take(mut self, key: &'static str) -> Result<Value, ApiError> {
        match self.body.get_mut(key).map(Value::take) {
            Some(Value::Null) | None => Err(ApiError::MissingField(key)),
            Some(value) => Ok(value),
        }
    }

    /// Take the array under `key` out of the response envelope.
    ///
    /// # Errors
    /// Returns `ApiError::MissingField` if `key` is not an array.
    pub fn take_list(self, key: &'static str) -> Result<Vec<Value>, ApiError> {
        match self.take(key)? {
            Value::Array(items) => Ok(items),
            _ => Err(ApiError::MissingField(key)),
        }
    }
}

/// Sends [`ApiRequest`]s to `base_url + path` through the shared HTTP stack.
///
/// Throttling, retries and the bearer token are applied by the underlying
/// [`HttpClient`]. Non-2xx statuses come back as
/// `ApiError::Http(HttpError::HttpStatus { .. })` with the original status.
#[derive(Debug, Clone)]
pub struct Transport {
    http: HttpClient,
    base_url: String,
    cache: Option<ResponseCache>,
}

impl Transport {
    #[must_use]
    pub fn new(http: HttpClient, base_url: &str, cache: Option<ResponseCache>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            cache,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Perform `request` and decode its JSON body.
    ///
    /// # Errors
    /// Returns the transport error or the non-2xx status that outlived the
    /// request's retry policy.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let ApiRequest {
            method,
            path,
            query,
            body,
            retry,
        } = request;

        let key = match (&self.cache, method) {
            (Some(_), ApiMethod::Get) => Some(cache_key(&path, &query)),
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                tracing::debug!(path = %path, "served from response cache");
                return Ok(ApiResponse {
                    status: StatusCode::OK,
                    total: hit.total,
                    body: hit.body,
                });
            }
        }

        let url = format!("{}{path}", self.base_url);
        tracing::debug!(method = method.as_str(), path = %path, "management API request");

        let builder = match method {
            ApiMethod::Get => self.http.get(&url),
            ApiMethod::Post => self.http.post(&url),
            ApiMethod::Put => self.http.put(&url),
            ApiMethod::Delete => self.http.delete(&url),
        };
        let mut builder = builder.query(query).retry(retry);
        if let Some(body) = &body {
            builder = builder.json(body)?;
        }

        let response = builder.send().await?;
        let status = response.status();
        let total = response.header_u64("total");
        let bytes = response.checked_bytes().await.inspect_err(|err| {
            tracing::debug!(
                method = method.as_str(),
                path = %path,
                error = %err,
                "management API request failed"
            );
        })?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        if let Some(cache) = &self.cache {
            match key {
                Some(key) => cache.insert(
                    key,
                    CachedResponse {
                        body: body.clone(),
                        total,
                    },
                ),
                None => cache.on_write(),
            }
        }

        Ok(ApiResponse {
            status,
            total,
            body,
        })
    }
}
