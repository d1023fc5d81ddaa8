use thiserror::Error;

/// Enumeration of errors that can abort process bootstrap.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] catalog_common::ConfigError),
    #[error("failed to serve health/metrics endpoint: {0}")]
    Serve(#[from] std::io::Error),
    #[error("failed to connect to MQTT broker at {url}: {source}")]
    MqttConnect {
        url: String,
        #[source]
        source: rumqttc::ClientError,
    },
    #[error("failed to bind local dispatch socket at {path}: {source}")]
    SocketBind {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
