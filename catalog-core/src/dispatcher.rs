//! Dispatcher (§4.2): the fan-out/fan-in scheduler. Grounded on
//! `original_source/request.go`'s `startDispatcher`/`startWorker`.
//!
//! Single task, non-blocking dual-exit loop: a `tokio::select!` with a
//! `biased` ordering over the dispatch/page/finished/shutdown channels,
//! falling through to an `else` branch that checks the dispatched/finished
//! balance -- the idiomatic stand-in for Go's `select { ... default: }`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use url::Url;

use crate::channels::{new_work_channels, DispatcherEndpoints, WorkChannels};
use crate::error::WorkUnitError;
use crate::task::{JobParam, Page};
use crate::upstream_client::UpstreamClient;
use crate::work_unit::WorkUnit;
use crate::writer::PageWriter;

/// How often the dispatcher re-checks `total == finished` while otherwise
/// idle. Tokio's `select!` has no true non-blocking default arm (unlike
/// Go's `select { ...; default: }`), so idle termination is detected with
/// a periodic poll branch instead -- the same "tick" idiom as
/// cyclotron-fetch's job-polling loop.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the Dispatcher loop until idle (dispatched == finished, dispatched > 0)
/// or shutdown. Spawns one Tokio task per Job Param popped from the dispatch
/// inbox, and forwards pages to the writer as the single consumer of the
/// response stream (§4.2 "Single-consumer response stream").
pub async fn run_dispatcher(
    mut endpoints: DispatcherEndpoints,
    work_channels: WorkChannels,
    upstream_host: Url,
    upstream: UpstreamClient,
    writer: Arc<Mutex<Box<dyn PageWriter>>>,
) {
    let mut total: u64 = 0;
    let mut finished: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = endpoints.shutdown.cancelled() => {
                break;
            }

            job = endpoints.dispatch_rx.recv() => {
                if let Some(job) = job {
                    total += 1;
                    spawn_work_unit(job, &upstream_host, upstream.clone(), work_channels.clone());
                }
            }

            page = endpoints.pages_rx.recv() => {
                if let Some(page) = page {
                    write_page(&writer, page).await;
                }
            }

            signal = endpoints.finished_rx.recv() => {
                if signal.is_some() {
                    finished += 1;
                }
            }

            _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {
                if total > 0 && total == finished {
                    break;
                }
            }
        }
    }

    let _ = endpoints.run_complete.send(());
}

async fn write_page(writer: &Arc<Mutex<Box<dyn PageWriter>>>, page: Page) {
    let mut writer = writer.lock().await;
    if let Err(e) = writer.write(page).await {
        tracing::warn!("page writer failed: {e}");
    }
}

fn spawn_work_unit(
    job: JobParam,
    upstream_host: &Url,
    upstream: UpstreamClient,
    channels: WorkChannels,
) {
    let upstream_host = upstream_host.clone();
    tokio::spawn(async move {
        let result: Result<(), WorkUnitError> = match WorkUnit::new(job, &upstream_host, upstream, channels.clone()) {
            Ok(unit) => unit.run().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            channels.emit_error(e.to_string()).await;
        }
        channels.mark_finished().await;
    });
}

/// Convenience for a Request Processor: allocate a fresh Work Channels
/// bundle, start the Dispatcher, and hand back the producer-side handle
/// plus the Processor's own endpoints.
pub fn start(
    shutdown: tokio_util::sync::CancellationToken,
    upstream_host: Url,
    upstream: UpstreamClient,
    writer: Arc<Mutex<Box<dyn PageWriter>>>,
) -> (WorkChannels, crate::channels::ProcessorEndpoints) {
    let (handle, dispatcher_endpoints, processor_endpoints) = new_work_channels(shutdown);
    let dispatcher_handle = handle.clone();
    tokio::spawn(run_dispatcher(
        dispatcher_endpoints,
        dispatcher_handle,
        upstream_host,
        upstream,
        writer,
    ));
    (handle, processor_endpoints)
}
