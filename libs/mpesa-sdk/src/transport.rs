//! One HTTP exchange with the gateway, bounded by a timeout.
//!
//! [`Transport`] is the seam between the gateway logic and the wire. The
//! production implementation, [`HttpTransport`], rides on `mpesa_http`; tests
//! substitute their own implementations to count or script calls.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use mpesa_http::{HttpClient, HttpError, TransportSecurity};
use mpesa_utils::SecretString;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::GatewayConfig;
use crate::error::{MpesaError, NetworkError, NetworkErrorKind};

pub const USER_AGENT: &str = concat!("mpesa-sdk/", env!("CARGO_PKG_VERSION"));

/// A request ready to go on the wire.
///
/// Header values are held as [`SecretString`] since they carry credentials.
#[derive(Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, SecretString)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl GatewayRequest {
    #[must_use]
    pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<SecretString>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// First header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&SecretString> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

impl fmt::Debug for GatewayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("GatewayRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &header_names)
            .field("has_body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Status and raw body of a delivered response, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl GatewayResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns the decoder error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, lossily decoded.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes a single request/response cycle.
///
/// Any HTTP status is a successful delivery. Only failures to obtain a
/// response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, NetworkError>;
}

/// [`Transport`] over the pooled hyper/rustls client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    /// Plain `http` base URLs are accepted as-is; everything else is TLS only.
    ///
    /// # Errors
    /// Returns [`MpesaError::Configuration`] if the TLS stack cannot be
    /// initialized.
    pub fn new(config: &GatewayConfig) -> Result<Self, MpesaError> {
        let transport = if config.base_url().scheme() == "http" {
            tracing::warn!(
                base_url = %config.base_url(),
                "gateway base URL uses plain HTTP; credentials are not encrypted"
            );
            TransportSecurity::AllowInsecureHttp
        } else {
            TransportSecurity::TlsOnly
        };

        let client = HttpClient::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .transport(transport)
            .build()
            .map_err(|e| {
                MpesaError::Configuration(format_http_error(&e, "HTTP client setup failed:"))
            })?;
        Ok(Self { client })
    }

    async fn exchange(&self, request: GatewayRequest) -> Result<GatewayResponse, HttpError> {
        let mut builder = self.client.request(request.method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name, value.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body)?;
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(GatewayResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, NetworkError> {
        let timeout = request.timeout;
        let method = request.method.clone();
        let path = request.url.path().to_owned();

        // Covers the body read too, which the client-level timeout does not.
        match tokio::time::timeout(timeout, self.exchange(request)).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    %method,
                    path = %path,
                    status = response.status.as_u16(),
                    bytes = response.body.len(),
                    "gateway response received"
                );
                Ok(response)
            }
            Ok(Err(err)) => {
                let err = NetworkError::from(err);
                tracing::warn!(%method, path = %path, kind = ?err.kind(), error = %err, "gateway request failed");
                Err(err)
            }
            Err(_) => {
                tracing::warn!(%method, path = %path, ?timeout, "gateway request timed out");
                Err(NetworkError::new(
                    NetworkErrorKind::Timeout,
                    format!("request timed out after {timeout:?}"),
                ))
            }
        }
    }
}

impl From<HttpError> for NetworkError {
    fn from(err: HttpError) -> Self {
        let kind = if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else if err.is_connect() || is_connection_fault(&err) {
            NetworkErrorKind::ConnectionFailure
        } else {
            NetworkErrorKind::Other
        };
        let message = format_http_error(&err, "gateway request");
        NetworkError::new(kind, message).with_source(err)
    }
}

/// Walk the source chain looking for a socket-level failure.
fn is_connection_fault(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            return matches!(
                io.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            );
        }
        current = e.source();
    }
    false
}

fn format_http_error(e: &HttpError, prefix: &str) -> String {
    match e {
        HttpError::Timeout(duration) => format!("{prefix} timed out after {duration:?}"),
        HttpError::Connect(err) => format!("{prefix} could not connect: {err}"),
        HttpError::Transport(err) => format!("{prefix} transport error: {err}"),
        HttpError::Tls(err) => format!("{prefix} TLS error: {err}"),
        HttpError::BodyTooLarge { limit, actual } => {
            format!("{prefix} response too large: limit {limit} bytes, got {actual} bytes")
        }
        HttpError::Json(err) => format!("{prefix} JSON encoding failed: {err}"),
        HttpError::RequestBuild(err) => format!("{prefix} request build failed: {err}"),
        HttpError::InvalidHeaderName(err) => format!("{prefix} invalid header name: {err}"),
        // Header values may hold credentials; keep them out of the message.
        HttpError::InvalidHeaderValue(_) => format!("{prefix} invalid header value"),
        HttpError::InvalidUri { url, reason, .. } => {
            format!("{prefix} invalid URL '{url}': {reason}")
        }
        HttpError::InvalidScheme { scheme, reason } => {
            format!("{prefix} invalid scheme '{scheme}': {reason}")
        }
        _ => format!("{prefix} failed"),
    }
}
