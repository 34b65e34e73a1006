//! Controller consumed by the presentation layer.
//!
//! Owns the visible [`ProgressState`] and the last request, and exposes
//! `start` / `retry` / `close`. Every run gets a cancellation token and a
//! monotonically increasing id; a run may only touch the visible state while
//! its id is current, so a closed or superseded run can never overwrite what
//! a newer one shows.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::executor::{DownloadExecutor, DownloadSummary, RetryObserver};
use super::progress::ProgressState;
use super::{DownloadError, ReportRequest};

/// Capacity of the transition channel
const TRANSITION_BUFFER: usize = 256;

/// Handle to a started run
pub struct RunHandle {
    run_id: u64,
    task: JoinHandle<Result<DownloadSummary, DownloadError>>,
}

impl RunHandle {
    /// Identifier of the run
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Wait for the run to reach its terminal outcome.
    ///
    /// A run whose task was aborted reports [`DownloadError::Cancelled`];
    /// one that panicked reports [`DownloadError::Internal`].
    pub async fn finished(self) -> Result<DownloadSummary, DownloadError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(DownloadError::Internal),
            Err(_) => Err(DownloadError::Cancelled),
        }
    }
}

/// Controller state guarded by one lock
#[derive(Default)]
struct RunSlot {
    current_run: u64,
    cancel: Option<CancellationToken>,
    last_request: Option<ReportRequest>,
}

struct Inner {
    executor: DownloadExecutor,
    success_dismiss_delay: Duration,
    state_tx: watch::Sender<ProgressState>,
    transitions_tx: broadcast::Sender<ProgressState>,
    slot: Mutex<RunSlot>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, RunSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `state`; callers hold the slot lock.
    fn publish(&self, state: ProgressState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        if changed {
            debug!(state = state.label(), "Progress state changed");
            // No subscribers is fine.
            let _ = self.transitions_tx.send(state);
        }
    }

    fn publish_if_current(&self, run_id: u64, state: ProgressState) -> bool {
        let slot = self.slot();
        if slot.current_run != run_id {
            debug!(run_id, current = slot.current_run, "Dropping update from stale run");
            return false;
        }
        self.publish(state);
        true
    }

    async fn run(
        self: Arc<Self>,
        run_id: u64,
        request: ReportRequest,
        cancel: CancellationToken,
    ) -> Result<DownloadSummary, DownloadError> {
        let mut observer = StateObserver {
            inner: &self,
            run_id,
            attempt: 0,
            max_attempts: 0,
        };
        let result = AssertUnwindSafe(self.executor.execute(&request, &cancel, &mut observer))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                error!(run_id, reason = %reason, "Download run panicked");
                Err(DownloadError::Internal)
            });

        match &result {
            Ok(_) => {
                if self.publish_if_current(run_id, ProgressState::Success) {
                    self.schedule_dismiss(run_id, cancel);
                }
            }
            Err(DownloadError::Cancelled) => debug!(run_id, "Run cancelled"),
            Err(e) => {
                self.publish_if_current(
                    run_id,
                    ProgressState::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
        result
    }

    fn schedule_dismiss(self: &Arc<Self>, run_id: u64, cancel: CancellationToken) {
        let inner = Arc::clone(self);
        let delay = self.success_dismiss_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {
                    if inner.publish_if_current(run_id, ProgressState::Idle) {
                        debug!(run_id, "Success dismissed");
                    }
                }
                _ = cancel.cancelled() => {}
            }
        });
    }
}

/// Maps executor notifications onto `Queued` states for one run
struct StateObserver<'a> {
    inner: &'a Inner,
    run_id: u64,
    attempt: u32,
    max_attempts: u32,
}

impl RetryObserver for StateObserver<'_> {
    fn on_queued(&mut self, wait_secs: u64, attempt: u32, max_attempts: u32) {
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self.inner.publish_if_current(
            self.run_id,
            ProgressState::Queued {
                seconds_left: wait_secs,
                attempt,
                max_attempts,
            },
        );
    }

    fn on_tick(&mut self, seconds_left: u64) {
        self.inner.publish_if_current(
            self.run_id,
            ProgressState::Queued {
                seconds_left,
                attempt: self.attempt,
                max_attempts: self.max_attempts,
            },
        );
    }
}

/// Orchestration boundary for a download widget.
///
/// Cheap to clone; clones drive the same state. `start` and `retry` spawn
/// onto the current tokio runtime.
#[derive(Clone)]
pub struct DownloadController {
    inner: Arc<Inner>,
}

impl DownloadController {
    /// Create a controller around an executor, taking timing from its config.
    pub fn new(executor: DownloadExecutor) -> Self {
        let success_dismiss_delay = executor.config().success_dismiss_delay;
        let (state_tx, _) = watch::channel(ProgressState::Idle);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            inner: Arc::new(Inner {
                executor,
                success_dismiss_delay,
                state_tx,
                transitions_tx,
                slot: Mutex::new(RunSlot::default()),
            }),
        }
    }

    /// Start a run, superseding any run in progress.
    pub fn start(&self, request: ReportRequest) -> RunHandle {
        let cancel = CancellationToken::new();
        let run_id = {
            let mut slot = self.inner.slot();
            if let Some(previous) = slot.cancel.replace(cancel.clone()) {
                previous.cancel();
            }
            slot.current_run += 1;
            slot.last_request = Some(request.clone());
            self.inner.publish(ProgressState::Downloading);
            slot.current_run
        };
        info!(run_id, request = %request, "Starting report download");

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(inner.run(run_id, request, cancel));
        RunHandle { run_id, task }
    }

    /// Replay the last request. Does nothing if `start` was never called.
    pub fn retry(&self) -> Option<RunHandle> {
        let request = self.inner.slot().last_request.clone()?;
        info!(request = %request, "Retrying last request");
        Some(self.start(request))
    }

    /// Return to `Idle`, halting any run in progress.
    pub fn close(&self) {
        let mut slot = self.inner.slot();
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        slot.current_run += 1;
        self.inner.publish(ProgressState::Idle);
    }

    /// Current state
    pub fn state(&self) -> ProgressState {
        self.inner.state_tx.borrow().clone()
    }

    /// Watch the current state
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive every state transition, in order
    pub fn transitions(&self) -> broadcast::Receiver<ProgressState> {
        self.inner.transitions_tx.subscribe()
    }

    /// Parameters `retry` would replay
    pub fn last_request(&self) -> Option<ReportRequest> {
        self.inner.slot().last_request.clone()
    }
}
