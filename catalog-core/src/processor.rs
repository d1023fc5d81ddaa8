//! Request Processor (§4.1): binds one inbound task URL to a Dispatcher
//! instance and a Page Writer, enforces the overall timeout, flushes
//! results. Grounded on `original_source/request.go`'s per-request
//! goroutine (GET descriptor -> PATCH running -> dispatch -> wait -> flush).

use std::sync::Arc;

use catalog_common::config::Config;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::dispatcher;
use crate::http_client::build_client;
use crate::task::{task_id_from_url, ResponseFormat};
use crate::task_client::{TaskClient, TaskPatch};
use crate::upstream_client::UpstreamClient;
use crate::writer::archive::UploadConfig;
use crate::writer::{build_writer, PageWriter};

/// Process one task end to end. Never returns an error: every failure path
/// either updates the task to a terminal state or, if the task could not
/// even be reached, is logged and dropped (§4.1 step 1).
pub async fn process_task(task_url: String, config: Arc<Config>, shutdown: CancellationToken) {
    let task_client_http = match build_client(&config.task_client, config.request_timeout.0) {
        Ok(client) => client,
        Err(e) => {
            error!(%task_url, "failed to build task client: {e}");
            return;
        }
    };
    let task_client = Arc::new(TaskClient::new(task_client_http, task_url.clone()));

    let descriptor = match task_client.get().await {
        Ok(d) => d,
        Err(e) => {
            error!(%task_url, "failed to fetch task descriptor: {e}");
            return;
        }
    };

    let response_format = match ResponseFormat::parse(&descriptor.input.response_format) {
        Some(format) => format,
        None => {
            error!(
                %task_url,
                format = %descriptor.input.response_format,
                "invalid response_format, aborting"
            );
            return;
        }
    };

    let upstream_http = match build_client(&config.upstream, config.request_timeout.0) {
        Ok(client) => client,
        Err(e) => {
            error!(%task_url, "failed to build upstream client: {e}");
            return;
        }
    };
    let upstream = UpstreamClient::new(upstream_http, config.upstream.bearer_token.clone());

    let upstream_host = match config
        .upstream
        .base_url
        .as_deref()
        .map(Url::parse)
        .transpose()
    {
        Ok(Some(url)) => url,
        _ => {
            error!(%task_url, "upstream base url is missing or invalid, aborting");
            return;
        }
    };

    let writer = match build_page_writer(response_format, &task_url, &descriptor, task_client.clone()) {
        Ok(writer) => Arc::new(Mutex::new(writer)),
        Err(e) => {
            error!(%task_url, "failed to build page writer: {e}");
            return;
        }
    };

    if let Err(e) = task_client
        .update(TaskPatch {
            state: Some("running"),
            status: Some("ok"),
            output: None,
            message: Some("Task Started".to_string()),
        })
        .await
    {
        error!(%task_url, "failed to mark task running, aborting: {e}");
        return;
    }

    let (handle, mut endpoints) =
        dispatcher::start(shutdown.clone(), upstream_host, upstream, writer.clone());

    for job in descriptor.input.jobs {
        handle.dispatch(job.normalize()).await;
    }

    let mut errors = Vec::new();
    let timeout = tokio::time::sleep(config.task_timeout.0);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                warn!(%task_url, "shutdown received, stopping task processing");
                break;
            }

            _ = &mut timeout => {
                warn!(%task_url, "task exceeded configured timeout");
                errors.push("task exceeded configured timeout".to_string());
                break;
            }

            _ = &mut endpoints.run_complete => {
                info!(%task_url, "dispatcher run complete");
                break;
            }

            message = endpoints.errors_rx.recv() => {
                if let Some(message) = message {
                    errors.push(message);
                }
            }
        }
    }

    // Drain any errors that arrived concurrently with the terminating branch.
    while let Ok(message) = endpoints.errors_rx.try_recv() {
        errors.push(message);
    }

    let mut writer = writer.lock().await;
    let result = if errors.is_empty() {
        writer.flush().await
    } else {
        writer.flush_errors(errors).await
    };
    if let Err(e) = result {
        error!(%task_url, "page writer failed to reach a terminal state: {e}");
    }
}

fn build_page_writer(
    format: ResponseFormat,
    task_url: &str,
    descriptor: &crate::task::TaskDescriptor,
    task_client: Arc<TaskClient>,
) -> Result<Box<dyn PageWriter>, crate::error::WriterError> {
    let upload_url = descriptor.input.upload_url.clone().unwrap_or_default();
    let upload = UploadConfig {
        upload_url,
        client: Client::new(),
        task_id: task_id_from_url(task_url),
    };
    build_writer(
        format,
        task_client,
        upload,
        descriptor.input.previous_sha.clone(),
        descriptor.input.previous_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::JobParam;
    use catalog_common::config::{EnvMsDuration, EnvSecondsDuration, TaskClientAuthConfig, UpstreamAuthConfig};
    use httpmock::prelude::*;
    use serde_json::{json, Map};
    use std::time::Duration;

    fn test_config(base_url: String) -> Arc<Config> {
        Arc::new(Config {
            host: "0.0.0.0".to_string(),
            port: 0,
            guid: "test".to_string(),
            mqtt_url: "tcp://localhost:1883".to_string(),
            local_dispatch_socket: "/tmp/test.sock".to_string(),
            task_timeout: EnvSecondsDuration(Duration::from_secs(5)),
            request_timeout: EnvMsDuration(Duration::from_millis(2000)),
            default_refresh_interval: EnvSecondsDuration(Duration::from_secs(10)),
            upstream: UpstreamAuthConfig {
                base_url: Some(base_url),
                bearer_token: None,
                client_cert_path: None,
                client_key_path: None,
                x_rh_identity: None,
                basic_auth_user: None,
                basic_auth_password: None,
                skip_verify_certificate: false,
            },
            task_client: TaskClientAuthConfig {
                client_cert_path: None,
                client_key_path: None,
                x_rh_identity: None,
                basic_auth_user: None,
                basic_auth_password: None,
            },
        })
    }

    #[tokio::test]
    async fn json_task_with_one_get_job_runs_to_completion() {
        let server = MockServer::start();

        let get_task = server.mock(|when, then| {
            when.method(GET).path("/tasks/1");
            then.status(200).json_body(json!({
                "id": "1",
                "state": "pending",
                "input": {
                    "response_format": "json",
                    "jobs": [{
                        "method": "get",
                        "href_slug": "/items",
                        "fetch_all_pages": false,
                        "params": {},
                        "fetch_related": [],
                        "page_prefix": "page"
                    }]
                }
            }));
        });
        let get_items = server.mock(|when, then| {
            when.method(GET).path("/items");
            then.status(200).json_body(json!({"results": []}));
        });
        let patch_task = server.mock(|when, then| {
            when.method(PATCH).path("/tasks/1");
            then.status(204);
        });

        let config = test_config(server.base_url());
        let shutdown = CancellationToken::new();

        process_task(server.url("/tasks/1"), config, shutdown).await;

        get_task.assert();
        get_items.assert();
        // one running/ok patch from the page, one completed/ok patch from flush
        patch_task.assert_hits(2);
    }

    #[test]
    fn job_param_round_trips_through_task_descriptor_json() {
        let job = JobParam {
            method: "get".to_string(),
            href_slug: "/x".to_string(),
            fetch_all_pages: false,
            params: Map::new(),
            apply_filter: None,
            refresh_interval_seconds: None,
            fetch_related: vec![],
            page_prefix: "page".to_string(),
        };
        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: JobParam = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.href_slug, "/x");
    }
}
