//! Terminal rendering of the controller state

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::downloader::{ProgressState, ProgressView};

/// Spinner redraw interval
const SPINNER_TICK: Duration = Duration::from_millis(100);

/// Draws one run's progress on a single spinner line.
///
/// Follows the watched state until the run ends (terminal state) or the
/// widget is closed (`Idle`).
pub struct ProgressRenderer {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl ProgressRenderer {
    /// Start rendering from `rx`
    pub fn spawn(mut rx: watch::Receiver<ProgressState>) -> Self {
        let bar = create_spinner();
        let task_bar = bar.clone();
        let task = tokio::spawn(async move {
            loop {
                let state = rx.borrow_and_update().clone();
                apply(&task_bar, &state);
                if state.is_terminal() || state == ProgressState::Idle {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        Self { bar, task }
    }

    /// Wait for the final frame and release the line.
    pub async fn finish(self) {
        let _ = self.task.await;
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(SPINNER_TICK);
    pb
}

fn apply(bar: &ProgressBar, state: &ProgressState) {
    match state.view() {
        None => bar.finish_and_clear(),
        Some(ProgressView::Spinner { text }) | Some(ProgressView::Countdown { text, .. }) => {
            bar.set_message(text)
        }
        Some(ProgressView::Confirmation { text }) => bar.finish_with_message(format!("✓ {text}")),
        Some(ProgressView::Failure { message, .. }) => {
            bar.abandon_with_message(format!("✗ {message}"))
        }
    }
}
