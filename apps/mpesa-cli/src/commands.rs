use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use mpesa_sdk::{GatewayConfig, GatewayResponse, MpesaClient, Settings};
use serde_json::{Value, json};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch an access token and print its lifetime
    Token,
    /// Send a push payment prompt to a customer
    StkPush(PayloadArgs),
    /// Register C2B confirmation and validation URLs
    RegisterUrl(RegisterUrlArgs),
    /// Disburse funds to a customer
    B2c(PayloadArgs),
    /// Validate settings and exit without contacting the gateway
    Check,
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// JSON file with the request payload
    #[arg(long, value_name = "FILE")]
    pub payload: PathBuf,
}

#[derive(Args, Debug)]
pub struct RegisterUrlArgs {
    #[arg(long)]
    pub api_key: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

impl Command {
    pub async fn run(&self, settings: &Settings) -> anyhow::Result<Value> {
        let config = settings.gateway_config()?;
        let response = match self {
            Self::Check => return Ok(describe(&config)),
            Self::Token => {
                let token = MpesaClient::new(config)?.access_token().await?;
                return Ok(json!({
                    "access_token": token.value(),
                    "token_type": "Bearer",
                    "expires_in": token.expires_in().as_secs(),
                }));
            }
            Self::StkPush(args) => {
                let payload = args.read()?;
                MpesaClient::new(config)?.stk_push().send(&payload).await?
            }
            Self::RegisterUrl(args) => {
                let payload = args.payload.read()?;
                MpesaClient::new(config)?
                    .c2b()
                    .register_url(&args.api_key, &payload)
                    .await?
            }
            Self::B2c(args) => {
                let payload = args.read()?;
                MpesaClient::new(config)?.b2c().pay(&payload).await?
            }
        };
        tracing::debug!(status = response.status.as_u16(), "gateway accepted request");
        Ok(render(&response))
    }
}

impl PayloadArgs {
    fn read(&self) -> anyhow::Result<Value> {
        read_payload(&self.payload)
    }
}

fn read_payload(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read payload file '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("payload file '{}' is not valid JSON", path.display()))
}

fn describe(config: &GatewayConfig) -> Value {
    let endpoints = config.endpoints();
    json!({
        "base_url": config.base_url().as_str(),
        "client_key": config.client_key(),
        "timeout_secs": config.timeout().as_secs_f64(),
        "endpoints": {
            "token": endpoints.token,
            "stk_push": endpoints.stk_push,
            "register_url": endpoints.register_url,
            "b2c_payment": endpoints.b2c_payment,
        },
    })
}

fn render(response: &GatewayResponse) -> Value {
    let body = response
        .json::<Value>()
        .unwrap_or_else(|_| Value::String(response.text()));
    json!({
        "status": response.status.as_u16(),
        "body": body,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn payload_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Amount": 10}}"#).unwrap();
        let value = read_payload(file.path()).unwrap();
        assert_eq!(value["Amount"], 10);
    }

    #[test]
    fn invalid_payload_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = read_payload(file.path()).unwrap_err();
        assert!(format!("{err}").contains("is not valid JSON"));
    }

    #[test]
    fn non_json_body_is_rendered_as_text() {
        let response = GatewayResponse::new(http::StatusCode::OK, "accepted");
        let rendered = render(&response);
        assert_eq!(rendered["status"], 200);
        assert_eq!(rendered["body"], "accepted");
    }

    #[test]
    fn check_reports_resolved_endpoints() {
        let config = GatewayConfig::new(
            "http://localhost:8080/",
            "key",
            "secret",
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let described = describe(&config);
        assert_eq!(described["client_key"], "key");
        assert_eq!(described["endpoints"]["token"], "/v1/token/generate");
        assert!(!described.to_string().contains("secret"));
    }
}
