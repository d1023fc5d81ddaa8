//! Task Client (§4.6): fetches and patches the remote Task Descriptor.
//! Grounded on `original_source/internal/catalogtask/catalogtask.go`'s
//! `Get`/`Update` pair and `taskupdater.go`'s PATCH body shape.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::TaskClientError;
use crate::task::TaskDescriptor;

#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct TaskClient {
    client: Client,
    task_url: String,
}

impl TaskClient {
    pub fn new(client: Client, task_url: String) -> Self {
        Self { client, task_url }
    }

    pub fn task_url(&self) -> &str {
        &self.task_url
    }

    /// GET the Task Descriptor; accepts 200/201/202 (§4.6).
    pub async fn get(&self) -> Result<TaskDescriptor, TaskClientError> {
        let response = self.client.get(&self.task_url).send().await?;
        let status = response.status().as_u16();
        if !matches!(status, 200 | 201 | 202) {
            return Err(TaskClientError::UnexpectedStatus { status });
        }
        let body = response.bytes().await?;
        let descriptor = serde_json::from_slice(&body)?;
        Ok(descriptor)
    }

    /// PATCH the task with a partial update; requires 204 (§4.6).
    pub async fn update(&self, patch: TaskPatch) -> Result<(), TaskClientError> {
        let response = self
            .client
            .patch(&self.task_url)
            .json(&patch)
            .send()
            .await?;
        let status = response.status().as_u16();
        if status != 204 {
            return Err(TaskClientError::UnexpectedStatus { status });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_decodes_task_descriptor() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/tasks/1");
            then.status(200).json_body(json!({
                "id": "1",
                "state": "pending",
                "input": {"response_format": "json", "jobs": []}
            }));
        });

        let client = TaskClient::new(Client::new(), server.url("/tasks/1"));
        let descriptor = client.get().await.unwrap();
        assert_eq!(descriptor.id, "1");
        mock.assert();
    }

    #[tokio::test]
    async fn update_requires_204() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH).path("/tasks/1");
            then.status(204);
        });

        let client = TaskClient::new(Client::new(), server.url("/tasks/1"));
        client
            .update(TaskPatch {
                state: Some("running"),
                ..Default::default()
            })
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn update_rejects_non_204() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/tasks/1");
            then.status(500);
        });

        let client = TaskClient::new(Client::new(), server.url("/tasks/1"));
        let err = client
            .update(TaskPatch {
                state: Some("running"),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskClientError::UnexpectedStatus { status: 500 }));
    }
}
