use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Semantic classification of a failed gateway response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ApiErrorKind {
    /// Vendor code `999991`.
    InvalidClientId,
    /// Vendor code `999996`.
    InvalidAuthentication,
    /// Vendor code `999997`.
    InvalidAuthorizationHeader,
    /// Vendor code `999998`.
    InvalidGrantType,
    /// JSON error body whose vendor code is absent or not recognized.
    UnknownApiError,
    /// Error body that is not JSON at all.
    HttpError,
}

impl ApiErrorKind {
    /// Stable name used in logs and CLI output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidClientId => "InvalidClientID",
            Self::InvalidAuthentication => "InvalidAuthentication",
            Self::InvalidAuthorizationHeader => "InvalidAuthorizationHeader",
            Self::InvalidGrantType => "InvalidGrantType",
            Self::UnknownApiError => "UnknownAPIError",
            Self::HttpError => "HTTPError",
        }
    }

    /// `true` for the four vendor-classified credential failures.
    #[must_use]
    pub fn is_authentication(self) -> bool {
        matches!(
            self,
            Self::InvalidClientId
                | Self::InvalidAuthentication
                | Self::InvalidAuthorizationHeader
                | Self::InvalidGrantType
        )
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified gateway failure. Built once by the classifier and never
/// mutated or merged afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (HTTP {status}): {message}")]
pub struct ApiErrorRecord {
    pub kind: ApiErrorKind,
    pub message: String,
    pub mitigation: String,
    pub vendor_code: Option<String>,
    pub status: u16,
    /// Leading part of the raw response body, for operators.
    pub body_preview: String,
}

/// Flavor of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionFailure,
    Other,
}

/// A request that never produced an HTTP response.
#[derive(Clone)]
pub struct NetworkError {
    kind: NetworkErrorKind,
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl NetworkError {
    #[must_use]
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn kind(&self) -> NetworkErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn mitigation(&self) -> &'static str {
        match self.kind {
            NetworkErrorKind::Timeout => {
                "retry later or increase the configured request timeout"
            }
            NetworkErrorKind::ConnectionFailure => {
                "check network connectivity and the configured gateway base URL"
            }
            NetworkErrorKind::Other => "inspect the underlying transport error",
        }
    }
}

impl fmt::Debug for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("source", &self.source.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::ConnectionFailure => "connection failure",
            NetworkErrorKind::Other => "network error",
        };
        write!(f, "{label}: {}", self.message)
    }
}

impl StdError for NetworkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// One offending field of a rejected payload or token response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// A payload or token response that failed its schema checks.
///
/// Every violation found is listed, not only the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// `None` when `violations` is empty.
    #[must_use]
    pub fn from_violations(violations: Vec<FieldViolation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// The message recorded for `field`, if it was rejected.
    #[must_use]
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.violations
            .iter()
            .find(|v| v.field == field)
            .map(|v| v.message.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed: ")?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

impl StdError for ValidationError {}

/// Flat error kind for callers that branch on the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    Configuration,
    Validation,
    InvalidClientId,
    InvalidAuthentication,
    InvalidAuthorizationHeader,
    InvalidGrantType,
    Timeout,
    ConnectionFailure,
    Network,
    Http,
    UnknownApi,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::InvalidClientId => "invalid_client_id",
            Self::InvalidAuthentication => "invalid_authentication",
            Self::InvalidAuthorizationHeader => "invalid_authorization_header",
            Self::InvalidGrantType => "invalid_grant_type",
            Self::Timeout => "timeout",
            Self::ConnectionFailure => "connection_failure",
            Self::Network => "network",
            Self::Http => "http",
            Self::UnknownApi => "unknown_api",
        };
        f.write_str(name)
    }
}

/// Every failure the gateway client can report.
///
/// `Clone` so that callers waiting on a shared token refresh all receive the
/// same error.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum MpesaError {
    /// Bad gateway coordinates or credentials at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Vendor-classified credential failure.
    #[error("authentication failed: {0}")]
    Authentication(ApiErrorRecord),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Non-JSON error body.
    #[error("HTTP error: {0}")]
    Http(ApiErrorRecord),

    /// JSON error body with an unrecognized vendor code.
    #[error("unknown API error: {0}")]
    UnknownApi(ApiErrorRecord),
}

impl MpesaError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Authentication(record) => match record.kind {
                ApiErrorKind::InvalidClientId => ErrorKind::InvalidClientId,
                ApiErrorKind::InvalidAuthentication => ErrorKind::InvalidAuthentication,
                ApiErrorKind::InvalidAuthorizationHeader => ErrorKind::InvalidAuthorizationHeader,
                ApiErrorKind::InvalidGrantType => ErrorKind::InvalidGrantType,
                ApiErrorKind::UnknownApiError => ErrorKind::UnknownApi,
                ApiErrorKind::HttpError => ErrorKind::Http,
            },
            Self::Network(err) => match err.kind() {
                NetworkErrorKind::Timeout => ErrorKind::Timeout,
                NetworkErrorKind::ConnectionFailure => ErrorKind::ConnectionFailure,
                NetworkErrorKind::Other => ErrorKind::Network,
            },
            Self::Http(_) => ErrorKind::Http,
            Self::UnknownApi(_) => ErrorKind::UnknownApi,
        }
    }

    /// Operator-facing hint on how to resolve the failure.
    #[must_use]
    pub fn mitigation(&self) -> &str {
        match self {
            Self::Configuration(_) => {
                "check the base URL, client key, client secret and timeout settings"
            }
            Self::Validation(_) => "correct the listed fields and resubmit the request",
            Self::Authentication(record) | Self::Http(record) | Self::UnknownApi(record) => {
                record.mitigation.as_str()
            }
            Self::Network(err) => err.mitigation(),
        }
    }

    /// The classified vendor record, for API failures.
    #[must_use]
    pub fn api_record(&self) -> Option<&ApiErrorRecord> {
        match self {
            Self::Authentication(record) | Self::Http(record) | Self::UnknownApi(record) => {
                Some(record)
            }
            _ => None,
        }
    }
}

impl From<ApiErrorRecord> for MpesaError {
    fn from(record: ApiErrorRecord) -> Self {
        match record.kind {
            kind if kind.is_authentication() => Self::Authentication(record),
            ApiErrorKind::HttpError => Self::Http(record),
            _ => Self::UnknownApi(record),
        }
    }
}
