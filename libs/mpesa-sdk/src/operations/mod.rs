//! Gateway operations: validate, attach a bearer token, send, classify.

mod b2c;
mod c2b;
mod stk_push;

use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::{Method, StatusCode};

pub use b2c::B2cPayment;
pub use c2b::C2bRegistration;
pub use stk_push::{StkPush, stk_password, stk_timestamp};

use crate::auth::TokenManager;
use crate::classify::{classify, undecodable_body};
use crate::error::MpesaError;
use crate::transport::{GatewayRequest, GatewayResponse, Transport};
use crate::validation::{OperationKind, RequestValidator};

/// Shared call path behind every operation.
///
/// Requests through one facade are independent and may run concurrently;
/// they only meet at the token manager's refresh.
#[derive(Clone)]
pub struct OperationFacade {
    kind: OperationKind,
    tokens: Arc<TokenManager>,
    transport: Arc<dyn Transport>,
}

impl OperationFacade {
    #[must_use]
    pub fn new(kind: OperationKind, tokens: Arc<TokenManager>, transport: Arc<dyn Transport>) -> Self {
        Self {
            kind,
            tokens,
            transport,
        }
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Run the operation with `payload`.
    ///
    /// # Errors
    /// [`MpesaError::Validation`] before any network call, token errors from
    /// the refresh, [`MpesaError::Network`] when no response arrived, or the
    /// classified error for a status of 400 and above. A success status
    /// with a body that is not JSON is an [`MpesaError::Http`] error.
    pub async fn execute(&self, payload: &serde_json::Value) -> Result<GatewayResponse, MpesaError> {
        self.execute_with_query(payload, &[]).await
    }

    #[tracing::instrument(name = "gateway_operation", skip_all, fields(operation = %self.kind))]
    pub(crate) async fn execute_with_query(
        &self,
        payload: &serde_json::Value,
        query: &[(&str, &str)],
    ) -> Result<GatewayResponse, MpesaError> {
        let validated = RequestValidator::validate(self.kind, payload)?;
        let body = validated.to_json()?;

        let token = self.tokens.get_token().await?;
        let config = self.tokens.config();
        let url = config.endpoint_url(self.path())?;
        let mut request = GatewayRequest::new(Method::POST, url, config.timeout())
            .header(AUTHORIZATION.as_str(), token.bearer_header())
            .json(body);
        for (key, value) in query {
            request = request.query(key, value);
        }

        let response = self.transport.send(request).await?;
        tracing::info!(
            operation = %self.kind,
            status = response.status.as_u16(),
            "gateway operation completed"
        );

        if let Some(record) = classify(response.status, &response.body) {
            if response.status == StatusCode::UNAUTHORIZED {
                // The bearer token was refused; do not offer it again.
                self.tokens.invalidate_if(&token);
            }
            tracing::warn!(
                operation = %self.kind,
                kind = %record.kind,
                vendor_code = record.vendor_code.as_deref().unwrap_or("-"),
                mitigation = %record.mitigation,
                "gateway operation failed"
            );
            return Err(record.into());
        }

        if serde_json::from_slice::<serde_json::Value>(&response.body).is_err() {
            let record = undecodable_body(response.status, &response.body);
            tracing::warn!(
                operation = %self.kind,
                status = record.status,
                "gateway answered with a body that is not JSON"
            );
            return Err(record.into());
        }
        Ok(response)
    }

    fn path(&self) -> &str {
        let endpoints = self.tokens.config().endpoints();
        match self.kind {
            OperationKind::StkPush => &endpoints.stk_push,
            OperationKind::RegisterUrl => &endpoints.register_url,
            OperationKind::B2cPayment => &endpoints.b2c_payment,
        }
    }
}

impl std::fmt::Debug for OperationFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationFacade")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::auth::{ManualClock, TokenState};
    use crate::config::GatewayConfig;
    use crate::error::{ErrorKind, NetworkError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    /// Answers token requests and records every other request.
    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<GatewayRequest>>,
        reply_status: Mutex<Option<(StatusCode, String)>>,
    }

    impl RecordingTransport {
        fn replying(status: StatusCode, body: &str) -> Arc<Self> {
            let transport = Self::default();
            *transport.reply_status.lock() = Some((status, body.to_owned()));
            Arc::new(transport)
        }

        fn count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, NetworkError> {
            let is_token = request.url.path().ends_with("/token/generate");
            self.requests.lock().push(request);
            if is_token {
                return Ok(GatewayResponse::new(
                    StatusCode::OK,
                    r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600}"#,
                ));
            }
            let (status, body) = self
                .reply_status
                .lock()
                .clone()
                .unwrap_or((StatusCode::OK, "{}".to_owned()));
            Ok(GatewayResponse::new(status, body))
        }
    }

    fn facade(kind: OperationKind, transport: Arc<RecordingTransport>) -> (OperationFacade, Arc<TokenManager>) {
        let config = GatewayConfig::new("https://sandbox.example", "k", "s", Duration::from_secs(5))
            .unwrap();
        let tokens = Arc::new(TokenManager::with_clock(
            config,
            transport.clone(),
            Arc::new(ManualClock::default()),
        ));
        (OperationFacade::new(kind, tokens.clone(), transport), tokens)
    }

    fn register_payload() -> serde_json::Value {
        json!({
            "ShortCode": "101010",
            "ResponseType": "Completed",
            "CommandID": "RegisterURL",
            "ConfirmationURL": "https://example.com/confirm",
            "ValidationURL": "https://example.com/validate"
        })
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_transport() {
        let transport = RecordingTransport::replying(StatusCode::OK, "{}");
        let (facade, tokens) = facade(OperationKind::StkPush, transport.clone());

        let err = facade.execute(&json!({"Amount": 0})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(transport.count(), 0);
        assert_eq!(tokens.state(), TokenState::Unauthenticated);
    }

    #[tokio::test]
    async fn sends_bearer_token_and_query() {
        let transport = RecordingTransport::replying(StatusCode::OK, r#"{"ResponseCode":"0"}"#);
        let (facade, _) = facade(OperationKind::RegisterUrl, transport.clone());

        let response = facade
            .execute_with_query(&register_payload(), &[("apikey", "user-1")])
            .await
            .unwrap();
        assert!(response.is_success());

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 2);
        let call = &requests[1];
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.url.path(), "/v1/c2b-register-url/register");
        assert_eq!(call.url.query(), Some("apikey=user-1"));
        assert_eq!(
            call.header_value("authorization").map(|v| v.expose().to_owned()),
            Some("Bearer abc".to_owned())
        );
        assert_eq!(call.body.as_ref().unwrap()["ShortCode"], "101010");
    }

    #[tokio::test]
    async fn classified_errors_carry_mitigation() {
        let transport = RecordingTransport::replying(
            StatusCode::BAD_REQUEST,
            r#"{"resultCode":"999998","resultDesc":"bad grant"}"#,
        );
        let (facade, _) = facade(OperationKind::RegisterUrl, transport);
        let err = facade.execute(&register_payload()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrantType);
        assert_eq!(err.mitigation(), "use client_credentials as the grant type");
    }

    #[tokio::test]
    async fn success_status_with_html_body_is_an_http_error() {
        let transport = RecordingTransport::replying(StatusCode::OK, "<html>captive portal</html>");
        let (facade, tokens) = facade(OperationKind::RegisterUrl, transport);
        let err = facade.execute(&register_payload()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.mitigation(), "check response status and API contract");
        let record = err.api_record().unwrap();
        assert_eq!(record.status, 200);
        assert!(record.message.contains("captive portal"));
        assert_eq!(tokens.state(), TokenState::Valid);
    }

    #[tokio::test]
    async fn unauthorized_response_drops_the_cached_token() {
        let transport = RecordingTransport::replying(StatusCode::UNAUTHORIZED, "Unauthorized");
        let (facade, tokens) = facade(OperationKind::RegisterUrl, transport);
        let err = facade.execute(&register_payload()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(tokens.state(), TokenState::Expired);
    }
}
