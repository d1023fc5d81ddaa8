use thiserror::Error;

/// Errors that can occur while assembling process-wide configuration.
/// These are fatal at startup: the process cannot serve any task without
/// a valid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing or invalid environment configuration: {0}")]
    Envconfig(#[from] envconfig::Error),
    #[error("invalid client certificate configuration: {0}")]
    InvalidTlsConfig(String),
}
