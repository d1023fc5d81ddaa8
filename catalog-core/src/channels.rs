//! The Work Channels coordination bundle (§3, §5): a dispatch inbox, a page
//! response outbox, an error outbox, a per-item finished signal, a
//! run-completion signal, and a shutdown signal.
//!
//! The original design uses unbuffered channels so a producing worker
//! blocks until the dispatcher accepts, giving natural backpressure.
//! Tokio's `mpsc` requires capacity >= 1; we use capacity 1 throughout as
//! the closest idiomatic approximation (see SPEC_FULL.md §4.2). Shutdown
//! is broadcast with a `CancellationToken`, the idiomatic substitute for
//! closing a Go channel.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::task::{JobParam, Page};

/// Unbuffered-channel approximation: smallest capacity Tokio allows.
pub const CHANNEL_CAPACITY: usize = 1;

/// Handles shared by every Work Unit and the Dispatcher that started it.
#[derive(Clone)]
pub struct WorkChannels {
    dispatch: mpsc::Sender<JobParam>,
    pages: mpsc::Sender<Page>,
    errors: mpsc::Sender<String>,
    finished: mpsc::Sender<()>,
    pub shutdown: CancellationToken,
}

impl WorkChannels {
    /// Enqueue a follow-up Job Param (next page, monitor-after-launch, related fetch).
    pub async fn dispatch(&self, job: JobParam) {
        // The dispatcher task always outlives its workers; a closed inbox
        // means we are already shutting down.
        let _ = self.dispatch.send(job).await;
    }

    /// Forward a successfully produced page to the Dispatcher.
    pub async fn emit_page(&self, page: Page) {
        let _ = self.pages.send(page).await;
    }

    /// Report a failure string; does not cancel sibling Work Units.
    pub async fn emit_error(&self, message: String) {
        let _ = self.errors.send(message).await;
    }

    /// Signal this Work Unit's termination, regardless of success or failure.
    pub async fn mark_finished(&self) {
        let _ = self.finished.send(()).await;
    }
}

/// Receiver endpoints owned by the Dispatcher.
pub struct DispatcherEndpoints {
    pub dispatch_rx: mpsc::Receiver<JobParam>,
    pub pages_rx: mpsc::Receiver<Page>,
    pub finished_rx: mpsc::Receiver<()>,
    pub shutdown: CancellationToken,
    pub run_complete: oneshot::Sender<()>,
}

/// Endpoints owned by the Request Processor.
pub struct ProcessorEndpoints {
    pub errors_rx: mpsc::Receiver<String>,
    pub run_complete: oneshot::Receiver<()>,
}

/// Build a fresh Work Channels bundle for one task. Returns the
/// producer-side handle to clone into every Work Unit, and the two
/// receiver bundles owned by the Dispatcher and the Request Processor
/// respectively.
pub fn new_work_channels(
    shutdown: CancellationToken,
) -> (WorkChannels, DispatcherEndpoints, ProcessorEndpoints) {
    let (dispatch_tx, dispatch_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (pages_tx, pages_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (errors_tx, errors_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (finished_tx, finished_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (run_complete_tx, run_complete_rx) = oneshot::channel();

    let handle = WorkChannels {
        dispatch: dispatch_tx,
        pages: pages_tx,
        errors: errors_tx,
        finished: finished_tx,
        shutdown: shutdown.clone(),
    };

    let dispatcher = DispatcherEndpoints {
        dispatch_rx,
        pages_rx,
        finished_rx,
        shutdown,
        run_complete: run_complete_tx,
    };

    let processor = ProcessorEndpoints {
        errors_rx,
        run_complete: run_complete_rx,
    };

    (handle, dispatcher, processor)
}
