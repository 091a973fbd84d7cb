#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Small helpers shared by the M-Pesa gateway crates.

pub mod duration_serde;
mod secret_string;

pub use secret_string::SecretString;
