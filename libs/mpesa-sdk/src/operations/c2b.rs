use std::sync::Arc;

use super::OperationFacade;
use crate::auth::TokenManager;
use crate::error::{MpesaError, ValidationError};
use crate::transport::{GatewayResponse, Transport};
use crate::validation::OperationKind;

/// Registers confirmation and validation URLs for customer-initiated payments.
#[derive(Debug, Clone)]
pub struct C2bRegistration {
    facade: OperationFacade,
}

impl C2bRegistration {
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>, transport: Arc<dyn Transport>) -> Self {
        Self {
            facade: OperationFacade::new(OperationKind::RegisterUrl, tokens, transport),
        }
    }

    /// `api_key` travels as the `apikey` query parameter.
    ///
    /// # Errors
    /// [`MpesaError::Validation`] for a blank `api_key`; otherwise see
    /// [`OperationFacade::execute`].
    pub async fn register_url(
        &self,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<GatewayResponse, MpesaError> {
        if api_key.trim().is_empty() {
            return Err(ValidationError::single("apikey", "must not be empty").into());
        }
        self.facade
            .execute_with_query(payload, &[("apikey", api_key)])
            .await
    }
}
