use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use time::OffsetDateTime;

use super::OperationFacade;
use crate::auth::TokenManager;
use crate::error::MpesaError;
use crate::transport::{GatewayResponse, Transport};
use crate::validation::OperationKind;

/// Merchant-initiated push payment: the customer gets a PIN prompt.
#[derive(Debug, Clone)]
pub struct StkPush {
    facade: OperationFacade,
}

impl StkPush {
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>, transport: Arc<dyn Transport>) -> Self {
        Self {
            facade: OperationFacade::new(OperationKind::StkPush, tokens, transport),
        }
    }

    /// # Errors
    /// See [`OperationFacade::execute`].
    pub async fn send(&self, payload: &serde_json::Value) -> Result<GatewayResponse, MpesaError> {
        self.facade.execute(payload).await
    }
}

/// `Password` field: base64 of shortcode, passkey and timestamp.
#[must_use]
pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    general_purpose::STANDARD.encode(format!("{short_code}{passkey}{timestamp}"))
}

/// `Timestamp` field (`YYYYMMDDHHMMSS`) in the offset of `at`.
#[must_use]
pub fn stk_timestamp(at: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}
