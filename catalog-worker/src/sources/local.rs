//! Local dispatch task source (§6, grounded on
//! `original_source/internal/request/grpc.go`'s one-request-in,
//! one-ack-out shape, reworked as newline-delimited JSON over a Unix
//! socket since no gRPC/tonic stack is carried by this workspace).

use std::sync::Arc;

use catalog_common::Config;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::WorkerError;
use crate::sources::TaskSource;

#[derive(Debug, Deserialize)]
struct DispatchRequest {
    message_id: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct DispatchAck {
    message_id: String,
    ok: bool,
}

pub struct LocalDispatchTaskSource;

#[async_trait::async_trait]
impl TaskSource for LocalDispatchTaskSource {
    async fn run(self: Box<Self>, config: Arc<Config>, shutdown: CancellationToken) -> Result<(), WorkerError> {
        let path = &config.local_dispatch_socket;
        let _ = std::fs::remove_file(path);

        let listener = UnixListener::bind(path).map_err(|e| WorkerError::SocketBind {
            path: path.clone(),
            source: e,
        })?;
        info!("listening for local dispatch requests on {path}");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let config = config.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(handle_connection(stream, config, shutdown));
                        }
                        Err(e) => warn!("failed to accept local dispatch connection: {e}"),
                    }
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    config: Arc<Config>,
    shutdown: CancellationToken,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("error reading from local dispatch socket: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: DispatchRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("failed to decode local dispatch request: {e}");
                continue;
            }
        };

        let ack = DispatchAck {
            message_id: request.message_id.clone(),
            ok: true,
        };
        if let Ok(mut body) = serde_json::to_vec(&ack) {
            body.push(b'\n');
            if write_half.write_all(&body).await.is_err() {
                warn!("failed to write ack for message {}", request.message_id);
                break;
            }
        }

        let config = config.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            catalog_core::process_task(request.url, config, shutdown).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn accepts_one_dispatch_request_and_acks() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("dispatch.sock");

        let listener = UnixListener::bind(&socket_path).unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let config = Arc::new(test_config(&socket_path));
            handle_connection(stream, config, CancellationToken::new()).await;
        });

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        let request = serde_json::json!({"message_id": "1", "url": "http://example.invalid/tasks/1"});
        let mut payload = serde_json::to_vec(&request).unwrap();
        payload.push(b'\n');
        client.write_all(&payload).await.unwrap();

        let mut buf = vec![0u8; 256];
        let n = tokio::io::AsyncReadExt::read(&mut client, &mut buf).await.unwrap();
        let ack: DispatchAck = serde_json::from_slice(&buf[..n - 1]).unwrap();
        assert_eq!(ack.message_id, "1");
        assert!(ack.ok);

        drop(client);
        let _ = server.await;
    }

    fn test_config(socket_path: &std::path::Path) -> Config {
        use catalog_common::config::{EnvMsDuration, EnvSecondsDuration, TaskClientAuthConfig, UpstreamAuthConfig};
        use std::time::Duration;

        Config {
            host: "0.0.0.0".to_string(),
            port: 0,
            guid: "test".to_string(),
            mqtt_url: "tcp://localhost:1883".to_string(),
            local_dispatch_socket: socket_path.to_string_lossy().to_string(),
            task_timeout: EnvSecondsDuration(Duration::from_secs(5)),
            request_timeout: EnvMsDuration(Duration::from_millis(500)),
            default_refresh_interval: EnvSecondsDuration(Duration::from_secs(10)),
            upstream: UpstreamAuthConfig {
                base_url: None,
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
        }
    }
}
