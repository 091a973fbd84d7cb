use crate::client::HttpService;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Method, Request};
use http_body_util::Full;
use serde::Serialize;
use tower::ServiceExt;

/// Fluent request builder returned by [`HttpClient`](crate::HttpClient).
///
/// Builder errors (bad header names, serialization failures) are held back
/// and reported by [`send`](Self::send), so call chains stay linear.
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: HttpService,
    max_body_size: usize,
    method: Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<(Bytes, &'static str)>,
    error: Option<HttpError>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: HttpService,
        max_body_size: usize,
        method: Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            method,
            url,
            headers: Vec::new(),
            body: None,
            error: None,
            transport_security,
        }
    }

    /// Add a header. An invalid name or value is reported by `send()`.
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

    /// Set a JSON body. `Content-Type: application/json` is added unless
    /// the caller already set a content type.
    ///
    /// # Errors
    /// Returns a deferred builder error, or `HttpError::Json` if
    /// serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let bytes = serde_json::to_vec(body)?;
        self.body = Some((Bytes::from(bytes), "application/json"));
        Ok(self)
    }

    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri =
            self.url
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") if self.transport_security == TransportSecurity::AllowInsecureHttp => {
                Ok(uri)
            }
            Some("http") => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request.
    ///
    /// # Errors
    /// Returns `HttpError` for builder errors, rejected URLs, timeouts and
    /// transport failures. HTTP error statuses are **not** errors here.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let uri = self.validate_url()?;

        let mut builder = Request::builder().method(self.method).uri(uri);
        let has_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
        if let Some((_, content_type)) = &self.body
            && !has_content_type
        {
            builder = builder.header(CONTENT_TYPE, *content_type);
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        let body = self.body.map(|(bytes, _)| bytes).unwrap_or_default();
        let request = builder.body(Full::new(body))?;

        let inner = self.service.oneshot(request).await?;
        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
