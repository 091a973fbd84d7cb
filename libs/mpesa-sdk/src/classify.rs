//! Translation of gateway error bodies into [`ApiErrorRecord`]s.
//!
//! Classification is a pure function of the HTTP status and the raw body.
//! It never fails: a body that cannot be decoded still produces a record.

use http::StatusCode;
use serde_json::Value;

use crate::error::{ApiErrorKind, ApiErrorRecord};

/// Upper bound on the raw body kept in a record.
pub const BODY_PREVIEW_LIMIT: usize = 8 * 1024;

const NO_DESCRIPTION: &str = "No description provided";

/// Classify a gateway response.
///
/// Returns `None` for statuses below 400: the caller proceeds with the body.
#[must_use]
pub fn classify(status: StatusCode, body: &[u8]) -> Option<ApiErrorRecord> {
    if status.as_u16() < 400 {
        return None;
    }
    Some(classify_failure(status, body))
}

/// Map an error body to a record regardless of the status it arrived with.
///
/// The vendor code decides the kind; the status is only carried along.
#[must_use]
pub fn classify_failure(status: StatusCode, body: &[u8]) -> ApiErrorRecord {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return undecodable_body(status, body);
    };
    let body_preview = preview(body);

    let vendor_code = vendor_code(&json);
    let description = text_field(&json, &["resultDesc", "errorMessage"]);
    let kind = vendor_code
        .as_deref()
        .map_or(ApiErrorKind::UnknownApiError, kind_for_code);

    let (mitigation, message) = match kind {
        ApiErrorKind::InvalidClientId => (
            "ensure the correct client identifier is used",
            description.unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
        ),
        ApiErrorKind::InvalidAuthentication => (
            "ensure the authentication scheme is Basic Auth",
            description.unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
        ),
        ApiErrorKind::InvalidAuthorizationHeader => (
            "ensure the authorization header is correctly formatted",
            description.unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
        ),
        ApiErrorKind::InvalidGrantType => (
            "use client_credentials as the grant type",
            description.unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
        ),
        _ => (
            "inspect raw vendor response",
            description.unwrap_or_else(|| format!("Unknown API error: {json}")),
        ),
    };

    tracing::debug!(
        status = status.as_u16(),
        kind = %kind,
        vendor_code = vendor_code.as_deref().unwrap_or("-"),
        "classified gateway error response"
    );

    ApiErrorRecord {
        kind,
        message,
        mitigation: mitigation.to_owned(),
        vendor_code,
        status: status.as_u16(),
        body_preview,
    }
}

/// Record for a body that is not JSON, whatever the status. A 2xx page from
/// a proxy or captive portal is a failure too.
#[must_use]
pub fn undecodable_body(status: StatusCode, body: &[u8]) -> ApiErrorRecord {
    let body_preview = preview(body);
    let message = if body_preview.trim().is_empty() {
        format!("HTTP {status} with an empty body")
    } else {
        format!("HTTP {status}: {body_preview}")
    };
    ApiErrorRecord {
        kind: ApiErrorKind::HttpError,
        message,
        mitigation: "check response status and API contract".to_owned(),
        vendor_code: None,
        status: status.as_u16(),
        body_preview,
    }
}

fn kind_for_code(code: &str) -> ApiErrorKind {
    match code {
        "999991" => ApiErrorKind::InvalidClientId,
        "999996" => ApiErrorKind::InvalidAuthentication,
        "999997" => ApiErrorKind::InvalidAuthorizationHeader,
        "999998" => ApiErrorKind::InvalidGrantType,
        _ => ApiErrorKind::UnknownApiError,
    }
}

// The gateway sends `resultCode` as a string, some deployments as a number;
// other endpoints use `errorCode`.
fn vendor_code(json: &Value) -> Option<String> {
    ["resultCode", "errorCode"]
        .iter()
        .filter_map(|key| json.get(key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn text_field(json: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| json.get(key))
        .find_map(Value::as_str)
        .map(str::to_owned)
}

fn preview(body: &[u8]) -> String {
    let end = body.len().min(BODY_PREVIEW_LIMIT);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: &Value) -> Vec<u8> {
        serde_json::to_vec(v).unwrap()
    }

    #[test]
    fn success_statuses_produce_no_error() {
        for status in [StatusCode::OK, StatusCode::CREATED, StatusCode::FOUND] {
            assert!(classify(status, b"not even json").is_none());
        }
    }

    #[test]
    fn known_vendor_codes_map_to_auth_kinds() {
        let cases = [
            ("999991", ApiErrorKind::InvalidClientId, "ensure the correct client identifier is used"),
            ("999996", ApiErrorKind::InvalidAuthentication, "ensure the authentication scheme is Basic Auth"),
            ("999997", ApiErrorKind::InvalidAuthorizationHeader, "ensure the authorization header is correctly formatted"),
            ("999998", ApiErrorKind::InvalidGrantType, "use client_credentials as the grant type"),
        ];
        for (code, kind, mitigation) in cases {
            let record = classify(
                StatusCode::BAD_REQUEST,
                &body(&json!({"resultCode": code, "resultDesc": "nope"})),
            )
            .unwrap();
            assert_eq!(record.kind, kind);
            assert_eq!(record.mitigation, mitigation);
            assert_eq!(record.message, "nope");
            assert_eq!(record.vendor_code.as_deref(), Some(code));
        }
    }

    #[test]
    fn invalid_client_id_is_independent_of_status() {
        let payload = body(&json!({"resultCode": "999991"}));
        for status in [200u16, 302, 400, 401, 403, 500, 503] {
            let status = StatusCode::from_u16(status).unwrap();
            let record = classify_failure(status, &payload);
            assert_eq!(record.kind, ApiErrorKind::InvalidClientId);
            assert_eq!(record.mitigation, "ensure the correct client identifier is used");
            assert_eq!(record.message, "No description provided");
        }
    }

    #[test]
    fn numeric_result_code_is_recognized() {
        let record = classify(
            StatusCode::UNAUTHORIZED,
            &body(&json!({"resultCode": 999_996, "resultDesc": "Invalid Authentication passed"})),
        )
        .unwrap();
        assert_eq!(record.kind, ApiErrorKind::InvalidAuthentication);
        assert_eq!(record.vendor_code.as_deref(), Some("999996"));
    }

    #[test]
    fn unknown_code_is_unknown_api_error() {
        let record = classify(
            StatusCode::INTERNAL_SERVER_ERROR,
            &body(&json!({"errorCode": "500.003.1001", "errorMessage": "Internal Server Error"})),
        )
        .unwrap();
        assert_eq!(record.kind, ApiErrorKind::UnknownApiError);
        assert_eq!(record.mitigation, "inspect raw vendor response");
        assert_eq!(record.message, "Internal Server Error");
        assert_eq!(record.vendor_code.as_deref(), Some("500.003.1001"));
    }

    #[test]
    fn absent_code_is_unknown_api_error() {
        let record = classify(StatusCode::BAD_REQUEST, &body(&json!({"foo": "bar"}))).unwrap();
        assert_eq!(record.kind, ApiErrorKind::UnknownApiError);
        assert!(record.message.starts_with("Unknown API error:"));
        assert!(record.vendor_code.is_none());
    }

    #[test]
    fn non_json_body_degrades_to_http_error() {
        let record = classify(StatusCode::BAD_GATEWAY, b"<html>upstream down</html>").unwrap();
        assert_eq!(record.kind, ApiErrorKind::HttpError);
        assert_eq!(record.mitigation, "check response status and API contract");
        assert!(record.message.contains("<html>upstream down</html>"));
        assert_eq!(record.status, 502);
    }

    #[test]
    fn empty_body_degrades_to_http_error() {
        let record = classify(StatusCode::SERVICE_UNAVAILABLE, b"").unwrap();
        assert_eq!(record.kind, ApiErrorKind::HttpError);
        assert!(record.message.contains("empty body"));
    }

    #[test]
    fn preview_is_bounded() {
        let big = vec![b'x'; BODY_PREVIEW_LIMIT * 2];
        let record = classify(StatusCode::BAD_REQUEST, &big).unwrap();
        assert_eq!(record.body_preview.len(), BODY_PREVIEW_LIMIT);
    }
}
