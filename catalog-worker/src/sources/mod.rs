//! Task sources (§6 "Inbound transport"): collaborators that turn an
//! inbound message into a task URL and spawn one Request Processor per
//! message. Grounded on `original_source/internal/request/mqtt.go` and
//! `grpc.go`'s "one message in, one `processRequest` goroutine out" shape.

pub mod local;
pub mod mqtt;

use std::sync::Arc;

use catalog_common::Config;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// A running task source; `stop` releases its underlying transport
/// resources (MQTT client disconnect, socket listener drop). Returns
/// `Err` only for the unrecoverable startup failures named by
/// `WorkerError` (broker unreachable, socket unbindable) -- a source
/// that starts cleanly runs until `shutdown` is cancelled.
#[async_trait::async_trait]
pub trait TaskSource: Send {
    async fn run(self: Box<Self>, config: Arc<Config>, shutdown: CancellationToken) -> Result<(), WorkerError>;
}
