use crate::client::{BufferedService, map_buffer_error};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::multipart::MultipartForm;
use crate::response::{HttpResponse, ResponseBody};
use crate::retry::RetryPolicy;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Request, Response};
use http_body_util::Full;
use serde::Serialize;
use tower::{Service, ServiceExt};

#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Bytes(Bytes),
    Json(Bytes),
    Multipart { body: Bytes, content_type: String },
}

/// HTTP request builder with fluent API
///
/// Created by [`crate::HttpClient::get`], [`crate::HttpClient::post`], etc.
/// Builder errors (bad header, unserializable body) are deferred and
/// surface from [`send()`](RequestBuilder::send).
///
/// ```ignore
/// let story: serde_json::Value = client
///     .post("https://mapi.example.com/v1/spaces/12345/stories")
///     .json(&serde_json::json!({ "story": { "name": "Home", "slug": "home" } }))?
///     .retry(Some(RetryPolicy::burst()))
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    method: http::Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    retry: Option<RetryPolicy>,
    error: Option<HttpError>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            method,
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: BodyKind::Empty,
            retry: None,
            error: None,
            transport_security,
        }
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Append query parameters; they are percent-encoded on send.
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a retry policy; without one the request is attempted once.
    pub fn retry(mut self, policy: Option<RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// # Errors
    /// Returns a deferred builder error, or `HttpError::Json` if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = BodyKind::Json(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Encode `form` as a `multipart/form-data` body.
    pub fn multipart(mut self, form: &MultipartForm) -> Self {
        self.body = BodyKind::Multipart {
            body: form.encode(),
            content_type: form.content_type(),
        };
        self
    }

    /// Set a raw body
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = BodyKind::Bytes(body);
        self
    }

    fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{encoded}", self.url)
    }

    /// Parse the URL and check its scheme against the transport security mode.
    fn validate_url(&self, url: &str) -> Result<http::Uri, HttpError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request through the client's middleware stack.
    ///
    /// Returns `Ok` for every HTTP status; use
    /// [`HttpResponse::checked_bytes`] or [`HttpResponse::json`] to turn a
    /// non-2xx status into an error.
    ///
    /// # Errors
    /// Returns `HttpError` for builder errors, invalid URLs, transport
    /// failures and timeouts that outlived the retry policy.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let url = self.full_url();
        let uri = self.validate_url(&url)?;

        let mut builder = Request::builder().method(self.method).uri(uri);

        let has_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
        if !has_content_type {
            match &self.body {
                BodyKind::Json(_) => builder = builder.header(CONTENT_TYPE, "application/json"),
                BodyKind::Multipart { content_type, .. } => {
                    builder = builder.header(CONTENT_TYPE, content_type.as_str());
                }
                BodyKind::Empty | BodyKind::Bytes(_) => {}
            }
        }

        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body_bytes = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Bytes(b) | BodyKind::Json(b) | BodyKind::Multipart { body: b, .. } => b,
        };

        let mut request = builder.body(Full::new(body_bytes))?;
        if let Some(policy) = self.retry {
            request.extensions_mut().insert(policy);
        }

        // Wait for a buffer slot instead of shedding the request.
        let svc = self.service.ready().await.map_err(map_buffer_error)?;
        let inner: Response<ResponseBody> = svc.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
