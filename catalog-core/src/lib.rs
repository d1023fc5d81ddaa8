//! Domain engine for catalog task processing: the Task Client, Upstream
//! Client, Filter, Artifact Sanitizer, Page Writers, Work Unit state
//! machine, Dispatcher, and Request Processor that ties them together.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod http_client;
pub mod processor;
pub mod sanitize;
pub mod task;
pub mod task_client;
pub mod upstream_client;
pub mod work_unit;
pub mod writer;

pub use error::{FilterError, SanitizeError, TaskClientError, WorkUnitError, WriterError};
pub use processor::process_task;
pub use task::{JobParam, Page, RelatedSpec, ResponseFormat, TaskDescriptor, TaskInput};
