use std::sync::Arc;

use crate::auth::{AccessToken, Clock, SystemClock, TokenManager};
use crate::config::GatewayConfig;
use crate::error::MpesaError;
use crate::operations::{B2cPayment, C2bRegistration, StkPush};
use crate::transport::{HttpTransport, Transport};

/// Entry point bundling one token manager with the three operations.
///
/// Cheap to clone; clones share the token cache.
#[derive(Debug, Clone)]
pub struct MpesaClient {
    tokens: Arc<TokenManager>,
    stk_push: StkPush,
    c2b: C2bRegistration,
    b2c: B2cPayment,
}

impl MpesaClient {
    /// Client over the default HTTP transport.
    ///
    /// # Errors
    /// Returns [`MpesaError::Configuration`] if the HTTP stack cannot be set
    /// up.
    pub fn new(config: GatewayConfig) -> Result<Self, MpesaError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport, Arc::new(SystemClock)))
    }

    #[must_use]
    pub fn with_transport(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = Arc::new(TokenManager::with_clock(config, transport.clone(), clock));
        Self {
            stk_push: StkPush::new(tokens.clone(), transport.clone()),
            c2b: C2bRegistration::new(tokens.clone(), transport.clone()),
            b2c: B2cPayment::new(tokens.clone(), transport),
            tokens,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// # Errors
    /// See [`TokenManager::get_token`].
    pub async fn access_token(&self) -> Result<AccessToken, MpesaError> {
        self.tokens.get_token().await
    }

    #[must_use]
    pub fn stk_push(&self) -> &StkPush {
        &self.stk_push
    }

    #[must_use]
    pub fn c2b(&self) -> &C2bRegistration {
        &self.c2b
    }

    #[must_use]
    pub fn b2c(&self) -> &B2cPayment {
        &self.b2c
    }
}
