//! Gateway coordinates and the environment-style settings they are read from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::value::Uncased;
use mpesa_utils::SecretString;
use serde::{Deserialize, Deserializer, de};
use url::Url;

use crate::error::MpesaError;
use crate::telemetry::LoggingConfig;

pub const DEFAULT_BASE_URL: &str = "https://apisandbox.safaricom.et";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint paths, relative to the gateway base URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub token: String,
    pub stk_push: String,
    pub register_url: String,
    pub b2c_payment: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token: "/v1/token/generate".to_owned(),
            stk_push: "/mpesa/stkpush/v3/processrequest".to_owned(),
            register_url: "/v1/c2b-register-url/register".to_owned(),
            b2c_payment: "/mpesa/b2c/v1/paymentrequest".to_owned(),
        }
    }
}

/// Immutable gateway coordinates and credentials.
///
/// Built once through [`GatewayConfig::new`] and shared by every component
/// of a client.
#[derive(Clone)]
pub struct GatewayConfig {
    base_url: Url,
    client_key: String,
    client_secret: SecretString,
    timeout: Duration,
    endpoints: Endpoints,
}

impl GatewayConfig {
    /// # Errors
    /// Returns [`MpesaError::Configuration`] when the base URL is not an
    /// absolute `http`/`https` URL with a host, when the key or secret is
    /// blank, or when the timeout is zero.
    pub fn new(
        base_url: &str,
        client_key: impl Into<String>,
        client_secret: impl Into<SecretString>,
        timeout: Duration,
    ) -> Result<Self, MpesaError> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| {
            MpesaError::Configuration(format!("base URL '{base_url}' is not a valid URL: {e}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(MpesaError::Configuration(format!(
                "base URL scheme '{}' is not supported, use http or https",
                base_url.scheme()
            )));
        }
        if base_url.host_str().is_none_or(str::is_empty) {
            return Err(MpesaError::Configuration(
                "base URL has no host".to_owned(),
            ));
        }

        let client_key = client_key.into();
        if client_key.trim().is_empty() {
            return Err(MpesaError::Configuration(
                "client key must not be empty".to_owned(),
            ));
        }
        let client_secret = client_secret.into();
        if client_secret.is_blank() {
            return Err(MpesaError::Configuration(
                "client secret must not be empty".to_owned(),
            ));
        }
        if timeout.is_zero() {
            return Err(MpesaError::Configuration(
                "timeout must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            base_url,
            client_key,
            client_secret,
            timeout,
            endpoints: Endpoints::default(),
        })
    }

    /// Replace the default endpoint paths.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    #[must_use]
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Resolve `path` against the base URL, keeping any base path prefix.
    ///
    /// # Errors
    /// Returns [`MpesaError::Configuration`] if the joined URL does not parse.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, MpesaError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| MpesaError::Configuration(format!("invalid endpoint URL '{joined}': {e}")))
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("client_key", &self.client_key)
            .field("client_secret", &self.client_secret)
            .field("timeout", &self.timeout)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// Environment variable names and the settings fields they feed.
const ENV_KEYS: &[(&str, &str)] = &[
    ("BASE_URL", "base_url"),
    ("CLIENT_KEY", "client_key"),
    ("CLIENT_SECRET", "client_secret"),
    ("TIMEOUT", "timeout"),
    ("MPESA_LOG_DIR", "log_dir"),
    ("LOG_LEVEL", "log_level"),
    ("ENVIRONMENT", "environment"),
];

/// Process settings: gateway coordinates plus logging preferences.
///
/// Sources, lowest precedence first: built-in defaults, an optional YAML
/// file, then the environment variables listed in [`Settings::load`].
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_key: String,
    #[serde(default)]
    pub client_secret: SecretString,
    #[serde(with = "mpesa_utils::duration_serde")]
    pub timeout: Duration,
    pub log_dir: PathBuf,
    pub log_level: String,
    #[serde(default, deserialize_with = "optional_string")]
    pub environment: Option<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
}

impl Settings {
    /// Read settings once.
    ///
    /// Recognized variables: `BASE_URL`, `CLIENT_KEY`, `CLIENT_SECRET`,
    /// `TIMEOUT` (seconds or a humantime value such as `45s`),
    /// `MPESA_LOG_DIR`, `LOG_LEVEL`, `ENVIRONMENT`.
    ///
    /// # Errors
    /// Returns [`MpesaError::Configuration`] if the YAML file is unreadable
    /// or any value has the wrong shape.
    pub fn load(yaml: Option<&Path>) -> Result<Self, MpesaError> {
        let mut figment = Figment::new().merge(Serialized::defaults(serde_json::json!({
            "base_url": DEFAULT_BASE_URL,
            "timeout": DEFAULT_TIMEOUT.as_secs(),
            "log_dir": "./logs",
            "log_level": "info",
        })));
        if let Some(path) = yaml {
            if !path.is_file() {
                return Err(MpesaError::Configuration(format!(
                    "config file '{}' does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::raw().filter_map(|key| {
            ENV_KEYS
                .iter()
                .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
                .map(|(_, field)| Uncased::from(*field))
        }));

        figment
            .extract()
            .map_err(|e| MpesaError::Configuration(format!("failed to load settings: {e}")))
    }

    /// Validate the gateway part of the settings.
    ///
    /// # Errors
    /// See [`GatewayConfig::new`].
    pub fn gateway_config(&self) -> Result<GatewayConfig, MpesaError> {
        Ok(GatewayConfig::new(
            &self.base_url,
            self.client_key.clone(),
            self.client_secret.clone(),
            self.timeout,
        )?
        .with_endpoints(self.endpoints.clone()))
    }

    #[must_use]
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            log_dir: self.log_dir.clone(),
            log_level: self.log_level.clone(),
            console: !self.is_test_environment(),
        }
    }

    /// `ENVIRONMENT=TEST` silences console logging.
    #[must_use]
    pub fn is_test_environment(&self) -> bool {
        self.environment.as_deref() == Some("TEST")
    }
}

fn string_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_any(LenientString)
}

fn optional_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_any(LenientString).map(Some)
}

struct LenientString;

impl de::Visitor<'_> for LenientString {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_owned())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
        Ok(v.to_string())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_coordinates() {
        let config =
            GatewayConfig::new("https://sandbox.example", "k", "s", Duration::from_secs(5)).unwrap();
        assert_eq!(config.base_url().as_str(), "https://sandbox.example/");
        assert_eq!(config.client_key(), "k");
        assert_eq!(config.client_secret().expose(), "s");
    }

    #[test]
    fn rejects_bad_coordinates() {
        let cases = [
            ("not a url", "k", "s", 5),
            ("ftp://sandbox.example", "k", "s", 5),
            ("https://sandbox.example", "  ", "s", 5),
            ("https://sandbox.example", "k", "", 5),
            ("https://sandbox.example", "k", "s", 0),
        ];
        for (url, key, secret, secs) in cases {
            let err = GatewayConfig::new(url, key, secret, Duration::from_secs(secs)).unwrap_err();
            assert!(
                matches!(err, MpesaError::Configuration(_)),
                "{url}/{key}/{secret}/{secs} should be rejected"
            );
        }
    }

    #[test]
    fn debug_redacts_the_secret() {
        let config =
            GatewayConfig::new("https://sandbox.example", "k", "very-secret", DEFAULT_TIMEOUT)
                .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn endpoint_url_keeps_base_path() {
        let config =
            GatewayConfig::new("https://gw.example/api/", "k", "s", DEFAULT_TIMEOUT).unwrap();
        let url = config.endpoint_url(&config.endpoints().token).unwrap();
        assert_eq!(url.as_str(), "https://gw.example/api/v1/token/generate");
    }

    #[test]
    fn settings_come_from_environment() {
        temp_env::with_vars(
            [
                ("BASE_URL", Some("https://env.example")),
                ("CLIENT_KEY", Some("12345")),
                ("CLIENT_SECRET", Some("s3cret")),
                ("TIMEOUT", Some("45s")),
                ("MPESA_LOG_DIR", Some("/tmp/mpesa-logs")),
                ("LOG_LEVEL", Some("debug")),
                ("ENVIRONMENT", Some("TEST")),
            ],
            || {
                let settings = Settings::load(None).unwrap();
                assert_eq!(settings.base_url, "https://env.example");
                assert_eq!(settings.client_key, "12345");
                assert_eq!(settings.client_secret.expose(), "s3cret");
                assert_eq!(settings.timeout, Duration::from_secs(45));
                assert_eq!(settings.log_dir, PathBuf::from("/tmp/mpesa-logs"));
                assert_eq!(settings.log_level, "debug");
                assert!(settings.is_test_environment());
                assert!(!settings.logging().console);

                let config = settings.gateway_config().unwrap();
                assert_eq!(config.timeout(), Duration::from_secs(45));
            },
        );
    }

    fn gateway_vars() -> Vec<&'static str> {
        ENV_KEYS.iter().map(|(var, _)| *var).collect()
    }

    #[test]
    fn defaults_apply_without_sources() {
        temp_env::with_vars_unset(gateway_vars(), || {
            let settings = Settings::load(None).unwrap();
            assert_eq!(settings.base_url, DEFAULT_BASE_URL);
            assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
            assert_eq!(settings.log_level, "info");
            assert_eq!(settings.log_dir, PathBuf::from("./logs"));
            assert!(settings.environment.is_none());
            assert_eq!(settings.endpoints, Endpoints::default());

            let err = settings.gateway_config().unwrap_err();
            assert!(matches!(err, MpesaError::Configuration(_)));
        });
    }

    #[test]
    fn environment_overrides_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpesa.yaml");
        std::fs::write(
            &path,
            "base_url: https://yaml.example\nclient_key: yaml-key\nclient_secret: yaml-secret\ntimeout: 10\nendpoints:\n  token: /oauth/token\n",
        )
        .unwrap();

        temp_env::with_vars_unset(gateway_vars(), || {
            let settings = Settings::load(Some(&path)).unwrap();
            assert_eq!(settings.base_url, "https://yaml.example");
            assert_eq!(settings.timeout, Duration::from_secs(10));
            assert_eq!(settings.endpoints.token, "/oauth/token");
            assert_eq!(settings.endpoints.b2c_payment, Endpoints::default().b2c_payment);
        });

        temp_env::with_vars(
            [("CLIENT_KEY", Some("env-key")), ("TIMEOUT", Some("3"))],
            || {
                let settings = Settings::load(Some(&path)).unwrap();
                assert_eq!(settings.client_key, "env-key");
                assert_eq!(settings.client_secret.expose(), "yaml-secret");
                assert_eq!(settings.timeout, Duration::from_secs(3));
            },
        );
    }

    #[test]
    fn missing_yaml_file_is_a_configuration_error() {
        let err = Settings::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, MpesaError::Configuration(_)));
    }
}
