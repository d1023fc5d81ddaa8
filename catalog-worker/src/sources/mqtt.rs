//! MQTT task source (§6, grounded on
//! `original_source/internal/request/mqtt.go`): subscribes to `out/<guid>`
//! and spawns one Request Processor per inbound `{"url": "..."}` payload.

use std::sync::Arc;
use std::time::Duration;

use catalog_common::Config;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::WorkerError;
use crate::sources::TaskSource;

#[derive(Debug, Deserialize)]
struct MqttMessage {
    url: String,
}

pub struct MqttTaskSource;

fn parse_broker(mqtt_url: &str) -> (String, u16) {
    let without_scheme = mqtt_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(mqtt_url);
    match without_scheme.rsplit_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse().unwrap_or(1883),
        ),
        None => (without_scheme.to_string(), 1883),
    }
}

#[async_trait::async_trait]
impl TaskSource for MqttTaskSource {
    async fn run(self: Box<Self>, config: Arc<Config>, shutdown: CancellationToken) -> Result<(), WorkerError> {
        let (host, port) = parse_broker(&config.mqtt_url);
        let client_id = format!("catalog_worker_{}", config.guid);
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut event_loop) = AsyncClient::new(options, 16);
        let topic = format!("out/{}", config.guid);
        client
            .subscribe(topic.as_str(), QoS::AtMostOnce)
            .await
            .map_err(|e| WorkerError::MqttConnect {
                url: config.mqtt_url.clone(),
                source: e,
            })?;
        info!("subscribed to MQTT topic {topic}");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    let _ = client.disconnect().await;
                    break;
                }

                event = event_loop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            match serde_json::from_slice::<MqttMessage>(&publish.payload) {
                                Ok(message) => {
                                    let config = config.clone();
                                    let shutdown = shutdown.clone();
                                    tokio::spawn(async move {
                                        catalog_core::process_task(message.url, config, shutdown).await;
                                    });
                                }
                                Err(e) => warn!("failed to decode MQTT payload: {e}"),
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("MQTT connection error, retrying: {e}");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
