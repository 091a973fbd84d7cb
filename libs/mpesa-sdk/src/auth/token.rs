use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use http::Method;
use http::header::AUTHORIZATION;
use mpesa_utils::SecretString;
use serde_json::Value;
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::classify::classify;
use crate::config::GatewayConfig;
use crate::error::{FieldViolation, MpesaError, ValidationError};
use crate::transport::{GatewayRequest, Transport};

/// A bearer token and the window in which it may be presented.
///
/// Replaced wholesale on refresh, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: SecretString,
    issued_at: OffsetDateTime,
    expires_in: Duration,
}

impl AccessToken {
    #[must_use]
    pub fn new(value: impl Into<SecretString>, issued_at: OffsetDateTime, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_in,
        }
    }

    /// Raw token value. Do not log it.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.expose()
    }

    #[must_use]
    pub fn issued_at(&self) -> OffsetDateTime {
        self.issued_at
    }

    #[must_use]
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        self.issued_at + self.expires_in
    }

    /// `now < issued_at + expires_in - skew`.
    ///
    /// The skew is capped at half the lifetime so short-lived tokens are
    /// still usable for a while.
    #[must_use]
    pub fn is_valid(&self, now: OffsetDateTime, skew: Duration) -> bool {
        let skew = skew.min(self.expires_in / 2);
        now < self.expires_at() - skew
    }

    /// `Authorization` header value for gateway calls.
    #[must_use]
    pub fn bearer_header(&self) -> SecretString {
        SecretString::new(format!("Bearer {}", self.value.expose()))
    }
}

/// `Basic base64(key:secret)` for the token endpoint.
pub(crate) fn basic_authorization(config: &GatewayConfig) -> SecretString {
    let credentials = Zeroizing::new(format!(
        "{}:{}",
        config.client_key(),
        config.client_secret().expose()
    ));
    let encoded = Zeroizing::new(general_purpose::STANDARD.encode(credentials.as_bytes()));
    SecretString::new(format!("Basic {}", &*encoded))
}

/// Exchange the client credentials for a fresh token. One network call.
pub(crate) async fn request_token(
    transport: &dyn Transport,
    config: &GatewayConfig,
    issued_at: OffsetDateTime,
) -> Result<AccessToken, MpesaError> {
    let url = config.endpoint_url(&config.endpoints().token)?;
    let request = GatewayRequest::new(Method::POST, url, config.timeout())
        .query("grant_type", "client_credentials")
        .header(AUTHORIZATION.as_str(), basic_authorization(config));

    let response = transport.send(request).await?;
    if let Some(record) = classify(response.status, &response.body) {
        tracing::warn!(
            status = record.status,
            kind = %record.kind,
            vendor_code = record.vendor_code.as_deref().unwrap_or("-"),
            "token request rejected"
        );
        return Err(record.into());
    }

    let token = parse_token_response(&response.body, issued_at)?;
    tracing::info!(
        expires_in_secs = token.expires_in.as_secs(),
        "access token issued"
    );
    Ok(token)
}

/// Check the issuance response with the same rigor as outgoing payloads.
pub(crate) fn parse_token_response(
    body: &[u8],
    issued_at: OffsetDateTime,
) -> Result<AccessToken, ValidationError> {
    let json: Value = serde_json::from_slice(body).map_err(|e| {
        ValidationError::single("body", format!("token response is not valid JSON: {e}"))
    })?;
    let Some(object) = json.as_object() else {
        return Err(ValidationError::single(
            "body",
            "token response must be a JSON object",
        ));
    };

    let mut violations = Vec::new();
    let mut reject = |field: &str, message: String| {
        violations.push(FieldViolation {
            field: field.to_owned(),
            message,
        });
    };

    let value = match object.get("access_token") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            reject("access_token", "must not be empty".to_owned());
            None
        }
        None | Some(Value::Null) => {
            reject("access_token", "is required".to_owned());
            None
        }
        Some(_) => {
            reject("access_token", "must be a string".to_owned());
            None
        }
    };

    let expires_in = match object.get("expires_in") {
        Some(Value::Number(n)) => n.as_u64().filter(|secs| *secs > 0),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok().filter(|secs| *secs > 0),
        _ => None,
    };
    if expires_in.is_none() {
        reject(
            "expires_in",
            "must be a positive integer number of seconds".to_owned(),
        );
    }

    match object.get("token_type") {
        None | Some(Value::Null) => {}
        Some(Value::String(t)) if t.eq_ignore_ascii_case("bearer") => {}
        Some(Value::String(t)) => reject("token_type", format!("unsupported token type '{t}'")),
        Some(_) => reject("token_type", "must be a string".to_owned()),
    }

    if let Some(err) = ValidationError::from_violations(violations) {
        return Err(err);
    }
    match (value, expires_in) {
        (Some(value), Some(secs)) => Ok(AccessToken::new(
            value,
            issued_at,
            Duration::from_secs(secs),
        )),
        _ => Err(ValidationError::single(
            "body",
            "token response is incomplete",
        )),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const T0: OffsetDateTime = OffsetDateTime::UNIX_EPOCH;

    #[test]
    fn parses_a_full_response() {
        let token = parse_token_response(
            br#"{"access_token":"abc","token_type":"Bearer","expires_in":3600}"#,
            T0,
        )
        .unwrap();
        assert_eq!(token.value(), "abc");
        assert_eq!(token.expires_in(), Duration::from_secs(3600));
        assert_eq!(token.issued_at(), T0);
    }

    #[test]
    fn expires_in_may_be_a_numeric_string() {
        let token =
            parse_token_response(br#"{"access_token":"abc","expires_in":"3599"}"#, T0).unwrap();
        assert_eq!(token.expires_in(), Duration::from_secs(3599));
    }

    #[test]
    fn reports_every_broken_field() {
        let err = parse_token_response(
            br#"{"access_token":"","token_type":"mac","expires_in":0}"#,
            T0,
        )
        .unwrap_err();
        assert_eq!(err.violations().len(), 3);
        assert_eq!(err.message_for("access_token"), Some("must not be empty"));
        assert!(err.message_for("expires_in").is_some());
        assert_eq!(
            err.message_for("token_type"),
            Some("unsupported token type 'mac'")
        );
    }

    #[test]
    fn rejects_missing_and_mistyped_fields() {
        for body in [
            r#"{"expires_in":3600}"#,
            r#"{"access_token":42,"expires_in":3600}"#,
            r#"{"access_token":"abc"}"#,
            r#"{"access_token":"abc","expires_in":-5}"#,
            r#"{"access_token":"abc","expires_in":"soon"}"#,
            r#"{"access_token":"abc","expires_in":12.5}"#,
        ] {
            assert!(
                parse_token_response(body.as_bytes(), T0).is_err(),
                "{body} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_json_and_non_object_bodies() {
        let err = parse_token_response(b"<html/>", T0).unwrap_err();
        assert!(err.message_for("body").is_some());
        let err = parse_token_response(b"[1,2]", T0).unwrap_err();
        assert!(err.message_for("body").is_some());
    }

    #[test]
    fn validity_honours_skew() {
        let token = AccessToken::new("abc", T0, Duration::from_secs(3600));
        let skew = Duration::from_secs(30);
        assert!(token.is_valid(T0, skew));
        assert!(token.is_valid(T0 + Duration::from_secs(3569), skew));
        assert!(!token.is_valid(T0 + Duration::from_secs(3570), skew));
        assert!(!token.is_valid(T0 + Duration::from_secs(4000), skew));
    }

    #[test]
    fn short_lived_tokens_cap_the_skew() {
        let token = AccessToken::new("abc", T0, Duration::from_secs(20));
        let skew = Duration::from_secs(30);
        assert!(token.is_valid(T0 + Duration::from_secs(9), skew));
        assert!(!token.is_valid(T0 + Duration::from_secs(10), skew));
    }

    #[test]
    fn basic_header_encodes_key_and_secret() {
        let config =
            GatewayConfig::new("https://sandbox.example", "k", "s", Duration::from_secs(5))
                .unwrap();
        assert_eq!(basic_authorization(&config).expose(), "Basic azpz");
    }

    #[test]
    fn debug_hides_the_token_value() {
        let token = AccessToken::new("super-secret-token", T0, Duration::from_secs(60));
        assert!(!format!("{token:?}").contains("super-secret-token"));
        assert_eq!(token.bearer_header().expose(), "Bearer super-secret-token");
    }
}
