use std::sync::Arc;

use super::OperationFacade;
use crate::auth::TokenManager;
use crate::error::MpesaError;
use crate::transport::{GatewayResponse, Transport};
use crate::validation::OperationKind;

/// Business-to-customer disbursement.
#[derive(Debug, Clone)]
pub struct B2cPayment {
    facade: OperationFacade,
}

impl B2cPayment {
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>, transport: Arc<dyn Transport>) -> Self {
        Self {
            facade: OperationFacade::new(OperationKind::B2cPayment, tokens, transport),
        }
    }

    /// # Errors
    /// See [`OperationFacade::execute`].
    pub async fn pay(&self, payload: &serde_json::Value) -> Result<GatewayResponse, MpesaError> {
        self.facade.execute(payload).await
    }
}
