use thiserror::Error;

/// Errors surfaced while executing one Job Param (§4.3, §7 "Upstream errors"
/// / "Transform errors"). These are reported once onto the error outbox by
/// the caller and never propagate to sibling Work Units.
#[derive(Error, Debug)]
pub enum WorkUnitError {
    #[error("URL: {url} Status: {status} Message: {body}")]
    UpstreamStatus {
        url: String,
        status: u16,
        body: String,
    },
    #[error("URL: {url} Status: 0 Message: Invalid method received {method}")]
    InvalidMethod { url: String, method: String },
    #[error("URL: {url} Status: 0 Message: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("URL: {url} Status: 0 Message: Object does not contain a status attribute")]
    MonitorMissingStatus { url: String },
    #[error("URL: {url} Status: 0 Message: Status {status} is not one of the known status")]
    MonitorUnknownStatus { url: String, status: String },
    #[error("URL: {url} Status: 0 Message: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("URL: {url} Status: 0 Message: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
    #[error("cancelled by shutdown signal")]
    Cancelled,
}

/// Errors from the Filter component (§4.8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("filter expression did not match the document shape: {0}")]
    ShapeMismatch(String),
    #[error("invalid filter expression: {0}")]
    InvalidExpression(String),
}

/// Errors from the Artifact Sanitizer (§4.9).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SanitizeError {
    #[error("Artifacts is greater than {limit} bytes")]
    TooLarge { limit: usize },
    #[error("failed to serialize artifacts: {0}")]
    Serialize(String),
}

/// Errors from the Task Client (§4.6). Fatal at task scope (§7 "Orchestrator errors").
#[derive(Error, Debug)]
pub enum TaskClientError {
    #[error("request to task orchestrator failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status} from task orchestrator")]
    UnexpectedStatus { status: u16 },
    #[error("failed to decode task descriptor: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors converting a Page Writer's accumulated failures into a terminal
/// state (§4.4, §4.5, §7 "Sink errors").
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("failed to stage page on disk: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to compress archive: {0}")]
    Compress(String),
    #[error("upload request failed: {0}")]
    Upload(#[from] reqwest::Error),
    #[error("unexpected status {status} from ingress upload")]
    UnexpectedUploadStatus { status: u16 },
    #[error("failed to decode upload response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unsupported response_format {0:?}")]
    UnsupportedFormat(String),
    #[error("task update failed: {0}")]
    TaskUpdate(#[from] TaskClientError),
}
