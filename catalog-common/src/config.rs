use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub port: u16,

    /// Identifies this worker instance, used as the MQTT client id and as
    /// the topic suffix ("out/<guid>") when subscribing.
    #[envconfig(from = "CATALOG_GUID", default = "catalog-worker")]
    pub guid: String,

    #[envconfig(from = "MQTT_URL", default = "tcp://localhost:1883")]
    pub mqtt_url: String,

    /// Path to a UNIX socket the local dispatch task source listens on.
    #[envconfig(from = "LOCAL_DISPATCH_SOCKET", default = "/tmp/catalog-worker.sock")]
    pub local_dispatch_socket: String,

    /// Overall ceiling on one task's processing time, see §4.1/§5.
    #[envconfig(from = "TASK_TIMEOUT_SECONDS", default = "600")]
    pub task_timeout: EnvSecondsDuration,

    /// Per-HTTP-call timeout used by every reqwest client built from this config.
    #[envconfig(from = "REQUEST_TIMEOUT_MS", default = "30000")]
    pub request_timeout: EnvMsDuration,

    /// Default poll interval for a MONITOR Job Param that does not set
    /// `refresh_interval_seconds` itself.
    #[envconfig(from = "DEFAULT_REFRESH_INTERVAL_SECONDS", default = "10")]
    pub default_refresh_interval: EnvSecondsDuration,

    #[envconfig(nested = true)]
    pub upstream: UpstreamAuthConfig,

    #[envconfig(nested = true)]
    pub task_client: TaskClientAuthConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Auth config for the Upstream Client (§4.2/§4.7): mutual TLS takes
/// priority over the identity header / basic-auth fallback, then a bearer
/// token is layered on top for the automation API itself.
#[derive(Envconfig, Clone)]
pub struct UpstreamAuthConfig {
    #[envconfig(from = "UPSTREAM_URL")]
    pub base_url: Option<String>,

    #[envconfig(from = "UPSTREAM_BEARER_TOKEN")]
    pub bearer_token: Option<String>,

    #[envconfig(from = "UPSTREAM_CLIENT_CERT_PATH")]
    pub client_cert_path: Option<String>,

    #[envconfig(from = "UPSTREAM_CLIENT_KEY_PATH")]
    pub client_key_path: Option<String>,

    #[envconfig(from = "UPSTREAM_X_RH_IDENTITY")]
    pub x_rh_identity: Option<String>,

    #[envconfig(from = "UPSTREAM_BASIC_AUTH_USER")]
    pub basic_auth_user: Option<String>,

    #[envconfig(from = "UPSTREAM_BASIC_AUTH_PASSWORD")]
    pub basic_auth_password: Option<String>,

    #[envconfig(from = "UPSTREAM_SKIP_VERIFY_CERTIFICATE", default = "false")]
    pub skip_verify_certificate: bool,
}

/// Auth config for the Task Client (orchestrator GET/PATCH surface),
/// independent of the upstream automation API's auth.
#[derive(Envconfig, Clone)]
pub struct TaskClientAuthConfig {
    #[envconfig(from = "TASK_CLIENT_CLIENT_CERT_PATH")]
    pub client_cert_path: Option<String>,

    #[envconfig(from = "TASK_CLIENT_CLIENT_KEY_PATH")]
    pub client_key_path: Option<String>,

    #[envconfig(from = "TASK_CLIENT_X_RH_IDENTITY")]
    pub x_rh_identity: Option<String>,

    #[envconfig(from = "TASK_CLIENT_BASIC_AUTH_USER")]
    pub basic_auth_user: Option<String>,

    #[envconfig(from = "TASK_CLIENT_BASIC_AUTH_PASSWORD")]
    pub basic_auth_password: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;
        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvSecondsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvSecondsDurationError;

impl FromStr for EnvSecondsDuration {
    type Err = ParseEnvSecondsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = s.parse::<u64>().map_err(|_| ParseEnvSecondsDurationError)?;
        Ok(EnvSecondsDuration(time::Duration::from_secs(secs)))
    }
}
