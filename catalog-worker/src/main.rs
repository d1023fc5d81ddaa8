//! Process bootstrap (ambient addition, §1/§2): config load, tracing init,
//! health/metrics HTTP server, and the two `TaskSource` transport adapters
//! that feed task URLs into the Request Processor. Grounded on
//! `hook-worker/src/main.rs`'s bootstrap shape.

mod error;
mod sources;

use std::future::ready;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use catalog_common::health::HealthRegistry;
use catalog_common::metrics::{serve, setup_metrics_router};
use catalog_common::{Config, ConfigError};
use envconfig::Envconfig;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::WorkerError;
use crate::sources::local::LocalDispatchTaskSource;
use crate::sources::mqtt::MqttTaskSource;
use crate::sources::TaskSource;

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::init_from_env().map_err(ConfigError::from)?);
    let shutdown = CancellationToken::new();

    let liveness = HealthRegistry::new("liveness");
    let mqtt_health = liveness
        .register("mqtt_source".to_string(), time::Duration::seconds(60))
        .await;
    let local_health = liveness
        .register("local_dispatch_source".to_string(), time::Duration::seconds(60))
        .await;

    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())));
    let router = router
        .merge(setup_metrics_router())
        .layer(TraceLayer::new_for_http());
    let bind = config.bind();
    let metrics_shutdown = shutdown.clone();

    let mut set = JoinSet::new();
    set.spawn(async move {
        tokio::select! {
            result = serve(router, &bind) => result.map_err(WorkerError::Serve),
            _ = metrics_shutdown.cancelled() => Ok(()),
        }
    });

    let sources: Vec<(Box<dyn TaskSource>, catalog_common::health::HealthHandle)> = vec![
        (Box::new(MqttTaskSource), mqtt_health),
        (Box::new(LocalDispatchTaskSource), local_health),
    ];

    for (source, health) in sources {
        let config = config.clone();
        let shutdown = shutdown.clone();
        set.spawn(async move {
            health.report_healthy().await;
            source.run(config, shutdown).await
        });
    }

    // A source failing (broker unreachable, socket unbindable) aborts the
    // process with its real error instead of leaving the worker running
    // with a dead transport; a clean shutdown signal just cancels and
    // drains the rest.
    let outcome = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("failed to listen for ctrl_c");
            info!("shutdown signal received, stopping task sources");
            shutdown.cancel();
            Ok(())
        }
        Some(result) = set.join_next() => {
            shutdown.cancel();
            result.expect("task source panicked")
        }
    };

    while let Some(result) = set.join_next().await {
        if let Err(e) = result.expect("task source panicked") {
            error!("task source exited with error: {e}");
        }
    }

    outcome
}

async fn index() -> &'static str {
    "catalog worker"
}
