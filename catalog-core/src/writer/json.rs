//! Page Writer -- JSON variant (§4.4): each page is sent as a running-state
//! task update; flush reports the terminal completed state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::WriterError;
use crate::task::Page;
use crate::task_client::{TaskClient, TaskPatch};
use crate::writer::PageWriter;

pub struct JsonWriter {
    task_client: Arc<TaskClient>,
    flushed: bool,
}

impl JsonWriter {
    pub fn new(task_client: Arc<TaskClient>) -> Self {
        Self {
            task_client,
            flushed: false,
        }
    }
}

#[async_trait]
impl PageWriter for JsonWriter {
    async fn write(&mut self, page: Page) -> Result<(), WriterError> {
        let output: Value = serde_json::from_slice(&page.data)?;
        self.task_client
            .update(TaskPatch {
                state: Some("running"),
                status: Some("ok"),
                output: Some(output),
                message: None,
            })
            .await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), WriterError> {
        if self.flushed {
            warn!("JsonWriter::flush called more than once, ignoring");
            return Ok(());
        }
        self.flushed = true;
        self.task_client
            .update(TaskPatch {
                state: Some("completed"),
                status: Some("ok"),
                output: None,
                message: Some("Task Ended Successfully".to_string()),
            })
            .await?;
        Ok(())
    }

    async fn flush_errors(&mut self, messages: Vec<String>) -> Result<(), WriterError> {
        if self.flushed {
            warn!("JsonWriter::flush_errors called more than once, ignoring");
            return Ok(());
        }
        self.flushed = true;
        self.task_client
            .update(TaskPatch {
                state: Some("completed"),
                status: Some("error"),
                output: Some(json!({ "errors": messages })),
                message: Some("Task Ended with errors".to_string()),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    fn client(url: String) -> Arc<TaskClient> {
        Arc::new(TaskClient::new(Client::new(), url))
    }

    #[tokio::test]
    async fn write_patches_running_ok_with_output() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/tasks/1")
                .json_body(json!({"state":"running","status":"ok","output":{"a":1}}));
            then.status(204);
        });

        let mut writer = JsonWriter::new(client(server.url("/tasks/1")));
        writer
            .write(Page {
                name: "page1.json".to_string(),
                data: br#"{"a":1}"#.to_vec(),
            })
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn flush_patches_completed_ok() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH).path("/tasks/1");
            then.status(204);
        });

        let mut writer = JsonWriter::new(client(server.url("/tasks/1")));
        writer.flush().await.unwrap();
        mock.assert();

        // second flush is a no-op, does not re-PATCH
        writer.flush().await.unwrap();
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn flush_errors_patches_completed_error_with_output() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/tasks/1")
                .json_body(json!({"state":"completed","status":"error","output":{"errors":["boom"]},"message":"Task Ended with errors"}));
            then.status(204);
        });

        let mut writer = JsonWriter::new(client(server.url("/tasks/1")));
        writer.flush_errors(vec!["boom".to_string()]).await.unwrap();
        mock.assert();
    }
}
