use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("mpesa-http/", env!("CARGO_PKG_VERSION"));

/// Where trusted root certificates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Bundled Mozilla roots; behaves the same on every host.
    #[default]
    WebPki,
    /// The operating system trust store.
    Native,
}

/// Which URL schemes the client will dial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    #[default]
    TlsOnly,
    /// Plain `http://` is accepted as well. Only for local mock gateways:
    /// Basic and Bearer credentials would cross the wire in clear text.
    AllowInsecureHttp,
}

/// Connection reuse settings handed to the hyper-util pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// `None` keeps hyper-util's own idle timeout.
    pub idle_timeout: Option<Duration>,
    pub max_idle_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(90)),
            max_idle_per_host: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Bounds connect, request write and response headers. Body reads are
    /// bounded separately by `max_body_size`.
    pub request_timeout: Duration,
    pub max_body_size: usize,
    pub user_agent: String,
    pub transport: TransportSecurity,
    pub tls_roots: TlsRootConfig,
    pub pool: PoolConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::WebPki,
            pool: PoolConfig::default(),
        }
    }
}

impl HttpClientConfig {
    /// Preset for talking to a mock gateway on localhost: plain HTTP,
    /// short timeouts, a small pool.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1024 * 1024,
            transport: TransportSecurity::AllowInsecureHttp,
            pool: PoolConfig {
                idle_timeout: Some(Duration::from_secs(10)),
                max_idle_per_host: 4,
            },
            ..Self::default()
        }
    }
}
