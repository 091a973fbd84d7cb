#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Client for the M-Pesa mobile-money gateway.
//!
//! Every operation follows the same path: the payload is checked offline,
//! a bearer token is taken from the [`TokenManager`] (refreshed lazily and
//! at most once at a time), the request goes out through a [`Transport`],
//! and any status of 400 or above is classified into an [`MpesaError`] that
//! carries an operator-facing mitigation.
//!
//! ```no_run
//! # async fn run() -> Result<(), mpesa_sdk::MpesaError> {
//! use std::time::Duration;
//! use mpesa_sdk::{GatewayConfig, MpesaClient};
//!
//! let config = GatewayConfig::new(
//!     "https://apisandbox.safaricom.et",
//!     "client-key",
//!     "client-secret",
//!     Duration::from_secs(30),
//! )?;
//! let client = MpesaClient::new(config)?;
//! let response = client
//!     .b2c()
//!     .pay(&serde_json::json!({ "CommandID": "BusinessPayment" }))
//!     .await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod classify;
mod client;
pub mod config;
mod error;
pub mod operations;
pub mod telemetry;
pub mod transport;
pub mod validation;

pub use auth::{AccessToken, Clock, ManualClock, SystemClock, TokenManager, TokenState};
pub use classify::{classify, classify_failure, undecodable_body};
pub use client::MpesaClient;
pub use config::{Endpoints, GatewayConfig, Settings};
pub use error::{
    ApiErrorKind, ApiErrorRecord, ErrorKind, FieldViolation, MpesaError, NetworkError,
    NetworkErrorKind, ValidationError,
};
pub use operations::{B2cPayment, C2bRegistration, OperationFacade, StkPush, stk_password, stk_timestamp};
pub use transport::{GatewayRequest, GatewayResponse, HttpTransport, Transport};
pub use validation::{OperationKind, RequestValidator, ValidatedRequest};
