#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Outbound HTTP engine for the M-Pesa gateway client.
//!
//! A hyper-based client with:
//! - TLS via rustls (HTTPS only by default)
//! - Connection pooling
//! - A per-request timeout applied by a tower layer
//! - User-Agent header injection
//! - Bounded response body reads
//!
//! Responses are returned for every HTTP status. Interpreting 4xx/5xx bodies
//! is left to the caller, which for this workspace is the gateway error
//! classifier.
//!
//! # Example
//!
//! ```ignore
//! use mpesa_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("my-app/1.0")
//!     .build()?;
//!
//! let resp = client
//!     .post("https://apisandbox.safaricom.et/v1/token/generate?grant_type=client_credentials")
//!     .header("authorization", "Basic azpz")
//!     .send()
//!     .await?;
//! let status = resp.status();
//! let body = resp.bytes().await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    DEFAULT_USER_AGENT, HttpClientConfig, PoolConfig, TlsRootConfig, TransportSecurity,
};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{UserAgentLayer, UserAgentService};
pub use request::RequestBuilder;
pub use response::{HttpResponse, ResponseBody};
