//! Shared HTTP transport
//!
//! One [`Transport`] is shared by every component of a client. It owns the
//! `reqwest` client, the base URL, and the process-wide default-header set
//! (authorization and attached configuration). Header mutation is not
//! coordinated beyond the lock that keeps each individual update atomic:
//! concurrent operations that attach different configurations to one shared
//! transport overwrite each other's header.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request, Response};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Body of an outgoing request
///
/// Bodies are kept as owned bytes so that the request can be rebuilt for the
/// single retry after a token refresh.
#[derive(Clone, Debug, Default)]
pub struct RequestBody(Vec<u8>);

impl RequestBody {
    /// Serialize a value as a JSON body
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    /// Raw body bytes
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Body length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the body is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Description of one HTTP exchange
#[derive(Clone, Debug)]
pub struct RequestSpec {
    /// HTTP method
    pub method: Method,
    /// URL relative to the base URL, query string already encoded
    pub relative_url: String,
    /// Exact Accept header value
    pub accept: Option<String>,
    /// Exact Content-Type header value (only applied when a body is present)
    pub content_type: Option<String>,
    /// Optional body
    pub body: Option<RequestBody>,
}

impl RequestSpec {
    /// A request without headers or body
    pub fn new(method: Method, relative_url: impl Into<String>) -> Self {
        Self {
            method,
            relative_url: relative_url.into(),
            accept: None,
            content_type: None,
            body: None,
        }
    }

    /// Set the Accept header
    pub fn accept(mut self, value: impl Into<String>) -> Self {
        self.accept = Some(value.into());
        self
    }

    /// Set a JSON body and matching Content-Type
    pub fn json_body<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(RequestBody::json(value)?);
        self.content_type = Some("application/json".to_string());
        Ok(self)
    }
}

/// Shared HTTP client with a mutable default-header set
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    default_headers: Arc<RwLock<HeaderMap>>,
}

impl Transport {
    /// Create a transport with a default `reqwest` client
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Self::with_http_client(http, config)
    }

    /// Create a transport around an existing `reqwest` client
    pub fn with_http_client(http: reqwest::Client, config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            http,
            base_url: base_with_trailing_slash(&config.base_url),
            timeout: config.timeout,
            default_headers: Arc::new(RwLock::new(HeaderMap::new())),
        })
    }

    /// The base URL endpoint paths are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a request from a [`RequestSpec`], merging in the default headers
    ///
    /// `reqwest` hands back the response as soon as the headers arrive; the body
    /// is streamed on demand, so large payloads are never buffered implicitly.
    pub fn build_request(&self, spec: &RequestSpec) -> Result<Request> {
        let relative = spec.relative_url.trim_start_matches('/');
        let url = self.base_url.join(relative).map_err(|e| {
            Error::config(
                "base_url",
                format!("cannot resolve {:?} against base URL: {}", spec.relative_url, e),
            )
        })?;

        let mut builder = self.http.request(spec.method.clone(), url);

        {
            let defaults = self
                .default_headers
                .read()
                .map_err(|_| Error::InvalidHeader("default header lock poisoned".into()))?;
            for (name, value) in defaults.iter() {
                builder = builder.header(name, value);
            }
        }

        if let Some(accept) = &spec.accept {
            builder = builder.header(ACCEPT, header_value(accept)?);
        }

        if let Some(body) = &spec.body {
            if let Some(content_type) = &spec.content_type {
                builder = builder.header(CONTENT_TYPE, header_value(content_type)?);
            }
            builder = builder.body(body.0.clone());
        }

        Ok(builder.build()?)
    }

    /// Send a prepared request
    ///
    /// Cancellation is checked immediately before the send and raced against it.
    /// The configured timeout bounds the wait for the response headers only;
    /// reading the body afterwards is not limited.
    pub async fn execute(&self, request: Request, cancel: &CancellationToken) -> Result<Response> {
        check_canceled(cancel)?;
        debug!(method = %request.method(), url = %request.url(), "sending request");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(canceled()),
            result = tokio::time::timeout(self.timeout, self.http.execute(request)) => match result {
                Ok(response) => Ok(response?),
                Err(_) => Err(Error::Timeout(self.timeout)),
            },
        }
    }

    /// Build and send the request described by `spec`
    pub async fn send(&self, spec: &RequestSpec, cancel: &CancellationToken) -> Result<Response> {
        let request = self.build_request(spec)?;
        self.execute(request, cancel).await
    }

    /// Replace a default header
    pub fn set_default_header(&self, name: &str, value: &str) -> Result<()> {
        let name = header_name(name)?;
        let value = header_value(value)?;
        let mut defaults = self
            .default_headers
            .write()
            .map_err(|_| Error::InvalidHeader("default header lock poisoned".into()))?;
        defaults.insert(name, value);
        Ok(())
    }

    /// Remove a default header; removing an absent header is a no-op
    pub fn remove_default_header(&self, name: &str) {
        if let (Ok(name), Ok(mut defaults)) = (header_name(name), self.default_headers.write()) {
            defaults.remove(name);
        }
    }

    /// Current value of a default header
    pub fn default_header(&self, name: &str) -> Option<String> {
        let name = header_name(name).ok()?;
        let defaults = self.default_headers.read().ok()?;
        defaults
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// Pass a successful response through, or turn it into an `N00.<status>` error
///
/// The body of a failed response is read as diagnostic text.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::http_failure(status, &body))
}

/// Read the full body and deserialize it as JSON
///
/// Transport failures while reading propagate unchanged; a body that does not
/// match `T` becomes an `N01` error.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(Error::deserialization)
}

/// Fail with [`Error::Canceled`] if the token has fired
pub fn check_canceled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(canceled());
    }
    Ok(())
}

pub(crate) fn canceled() -> Error {
    Error::Canceled("the operation was canceled".to_string())
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidHeader(format!("{:?}: {}", name, e)))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(format!("value: {}", e)))
}

// `Url::join` drops the last path segment unless the base ends with '/'.
fn base_with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
