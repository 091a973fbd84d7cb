//! Offline schema checks for operation payloads.
//!
//! A payload either yields a fully checked [`ValidatedRequest`] or a
//! [`ValidationError`] listing every offending field. Nothing here touches
//! the network or the token cache.

mod models;
mod rules;

use std::fmt;

use serde::Serialize;

pub use models::{
    B2C_COMMAND_IDS, B2cPaymentRequest, REGISTER_RESPONSE_TYPES, ReferenceItem,
    RegisterUrlRequest, STK_TRANSACTION_TYPES, StkPushRequest,
};

use crate::error::ValidationError;
use rules::FieldReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    StkPush,
    RegisterUrl,
    B2cPayment,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StkPush => "stk_push",
            Self::RegisterUrl => "register_url",
            Self::B2cPayment => "b2c_payment",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload that passed every check for its operation. Serializes to the
/// gateway's wire body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ValidatedRequest {
    StkPush(StkPushRequest),
    RegisterUrl(RegisterUrlRequest),
    B2cPayment(B2cPaymentRequest),
}

impl ValidatedRequest {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::StkPush(_) => OperationKind::StkPush,
            Self::RegisterUrl(_) => OperationKind::RegisterUrl,
            Self::B2cPayment(_) => OperationKind::B2cPayment,
        }
    }

    /// Wire form of the request.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if the record cannot be encoded.
    pub fn to_json(&self) -> Result<serde_json::Value, ValidationError> {
        serde_json::to_value(self)
            .map_err(|e| ValidationError::single("payload", format!("cannot encode payload: {e}")))
    }
}

/// Stateless payload checker.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestValidator;

impl RequestValidator {
    /// # Errors
    /// Returns a [`ValidationError`] naming every field that failed.
    pub fn validate(
        kind: OperationKind,
        payload: &serde_json::Value,
    ) -> Result<ValidatedRequest, ValidationError> {
        let mut reader = FieldReader::new(payload)?;
        let built = match kind {
            OperationKind::StkPush => {
                StkPushRequest::read(&mut reader).map(ValidatedRequest::StkPush)
            }
            OperationKind::RegisterUrl => {
                RegisterUrlRequest::read(&mut reader).map(ValidatedRequest::RegisterUrl)
            }
            OperationKind::B2cPayment => {
                B2cPaymentRequest::read(&mut reader).map(ValidatedRequest::B2cPayment)
            }
        };
        let validated = reader.finish(built);
        if let Err(err) = &validated {
            tracing::debug!(operation = %kind, violations = err.violations().len(), "payload rejected");
        }
        validated
    }
}
