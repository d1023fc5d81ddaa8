//! Page Writer (§4.4, §4.5): the sink abstraction. Grounded on
//! `rust/capture/src/sinks/mod.rs`'s `Event` trait / one-file-per-sink layout.

pub mod archive;
pub mod json;

use async_trait::async_trait;

use crate::error::WriterError;
use crate::task::{Page, ResponseFormat};

#[async_trait]
pub trait PageWriter: Send {
    /// Called by the Dispatcher for every page produced by a Work Unit.
    async fn write(&mut self, page: Page) -> Result<(), WriterError>;

    /// Called exactly once by the Request Processor when the run completed
    /// with no accumulated errors.
    async fn flush(&mut self) -> Result<(), WriterError>;

    /// Called exactly once by the Request Processor when one or more
    /// errors were accumulated, or on timeout/shutdown.
    async fn flush_errors(&mut self, messages: Vec<String>) -> Result<(), WriterError>;
}

/// Build the Page Writer named by the task's `response_format` (§4.1 step 2).
pub fn build_writer(
    format: ResponseFormat,
    task_client: std::sync::Arc<crate::task_client::TaskClient>,
    upload: archive::UploadConfig,
    previous_sha: Option<String>,
    previous_size: Option<u64>,
) -> Result<Box<dyn PageWriter>, WriterError> {
    match format {
        ResponseFormat::Json => Ok(Box::new(json::JsonWriter::new(task_client))),
        ResponseFormat::Tar => Ok(Box::new(archive::ArchiveWriter::new(
            task_client,
            upload,
            previous_sha,
            previous_size,
        )?)),
    }
}
