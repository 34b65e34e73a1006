//! Controller state transitions, retry and cancellation

use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use tokio::time::sleep;

use report_downloader::downloader::{
    DownloadController, DownloadError, DownloadExecutor, ProgressState, RetryConfig,
};
use report_downloader::fetcher::retry_formatter::{SERVER_BUSY_MESSAGE, UNEXPECTED_ERROR_MESSAGE};
use report_downloader::fetcher::DownloadOutcome;

use crate::support::{rate_limited, request, success, ScriptedFetcher};

fn controller(fetcher: &std::sync::Arc<ScriptedFetcher>) -> DownloadController {
    DownloadController::new(DownloadExecutor::new(fetcher.clone()))
}

fn drain(rx: &mut Receiver<ProgressState>) -> Vec<ProgressState> {
    let mut states = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(state) => states.push(state),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return states,
            Err(TryRecvError::Lagged(n)) => panic!("lagged by {n}"),
        }
    }
}

fn queued(seconds_left: u64, attempt: u32, max_attempts: u32) -> ProgressState {
    ProgressState::Queued {
        seconds_left,
        attempt,
        max_attempts,
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_shows_then_dismisses_itself() {
    let fetcher = ScriptedFetcher::new(vec![success(b"%PDF")]);
    let controller = controller(&fetcher);
    let mut transitions = controller.transitions();
    assert_eq!(controller.state(), ProgressState::Idle);

    let summary = controller.start(request("a.pdf")).finished().await.unwrap();
    assert_eq!(summary.attempts, 1);
    assert_eq!(controller.state(), ProgressState::Success);

    sleep(Duration::from_millis(1999)).await;
    assert_eq!(controller.state(), ProgressState::Success);

    sleep(Duration::from_millis(2)).await;
    assert_eq!(controller.state(), ProgressState::Idle);

    assert_eq!(
        drain(&mut transitions),
        vec![
            ProgressState::Downloading,
            ProgressState::Success,
            ProgressState::Idle
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_replays_last_request_after_error() {
    let fetcher = ScriptedFetcher::new(vec![
        DownloadOutcome::AuthError {
            message: "Your session has expired. Please log in again.".to_string(),
        },
        success(b"%PDF"),
    ]);
    let controller = controller(&fetcher);
    let original = request("invoice-2024-06.pdf");

    let result = controller.start(original.clone()).finished().await;
    assert!(matches!(result, Err(DownloadError::AuthError(_))));
    assert_eq!(
        controller.state(),
        ProgressState::Error {
            message: "Your session has expired. Please log in again.".to_string()
        }
    );
    assert_eq!(controller.last_request(), Some(original.clone()));

    let handle = controller.retry().expect("last request recorded");
    handle.finished().await.unwrap();

    assert_eq!(fetcher.calls(), vec![original.clone(), original]);
    assert_eq!(controller.state(), ProgressState::Success);
}

#[tokio::test(start_paused = true)]
async fn test_retry_without_previous_start_does_nothing() {
    let fetcher = ScriptedFetcher::new(Vec::new());
    let controller = controller(&fetcher);

    assert!(controller.retry().is_none());
    assert_eq!(controller.state(), ProgressState::Idle);
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_queued_states_follow_the_countdown() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(10), rate_limited(3), success(b"%PDF")]);
    let controller = controller(&fetcher);
    let mut transitions = controller.transitions();

    controller.start(request("a.pdf")).finished().await.unwrap();
    sleep(Duration::from_secs(3)).await;

    let mut expected = vec![ProgressState::Downloading];
    expected.extend((0..=10).rev().map(|s| queued(s, 1, 3)));
    expected.extend((0..=3).rev().map(|s| queued(s, 2, 3)));
    expected.extend([ProgressState::Success, ProgressState::Idle]);
    assert_eq!(drain(&mut transitions), expected);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_surfaces_busy_error() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(1), rate_limited(1)]);
    let controller = DownloadController::new(
        DownloadExecutor::new(fetcher.clone())
            .with_config(RetryConfig::default().with_max_attempts(2)),
    );
    let mut transitions = controller.transitions();

    let result = controller.start(request("a.pdf")).finished().await;

    assert_eq!(result, Err(DownloadError::Exhausted { attempts: 2 }));
    let mut expected = vec![ProgressState::Downloading];
    expected.extend((0..=1).rev().map(|s| queued(s, 1, 2)));
    expected.push(ProgressState::Error {
        message: SERVER_BUSY_MESSAGE.to_string(),
    });
    assert_eq!(drain(&mut transitions), expected);
    assert_eq!(
        controller.state(),
        ProgressState::Error {
            message: SERVER_BUSY_MESSAGE.to_string()
        }
    );

    // Errors stay up until closed.
    sleep(Duration::from_secs(60)).await;
    assert!(controller.state().is_terminal());
    controller.close();
    assert_eq!(controller.state(), ProgressState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_countdown_halts_run() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(10), success(b"%PDF")]);
    let controller = controller(&fetcher);

    let handle = controller.start(request("a.pdf"));
    sleep(Duration::from_secs(3)).await;
    assert!(matches!(controller.state(), ProgressState::Queued { .. }));

    controller.close();
    assert_eq!(controller.state(), ProgressState::Idle);
    assert_eq!(handle.finished().await, Err(DownloadError::Cancelled));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(controller.state(), ProgressState::Idle);
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_success_cancels_dismiss() {
    let fetcher = ScriptedFetcher::new(vec![success(b"%PDF"), success(b"%PDF")]);
    let controller = controller(&fetcher);

    controller.start(request("a.pdf")).finished().await.unwrap();
    controller.close();
    assert_eq!(controller.state(), ProgressState::Idle);

    // A new run started before the old dismiss deadline keeps its own state.
    let mut transitions = controller.transitions();
    sleep(Duration::from_millis(1500)).await;
    controller.start(request("b.pdf")).finished().await.unwrap();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(controller.state(), ProgressState::Success);

    sleep(Duration::from_millis(1001)).await;
    assert_eq!(controller.state(), ProgressState::Idle);
    assert_eq!(
        drain(&mut transitions),
        vec![
            ProgressState::Downloading,
            ProgressState::Success,
            ProgressState::Idle
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_superseded_run_never_touches_state() {
    let fetcher = ScriptedFetcher::with_delays(vec![
        (
            Duration::from_secs(5),
            DownloadOutcome::ServerError {
                message: "stale".to_string(),
            },
        ),
        (Duration::ZERO, success(b"%PDF")),
    ]);
    let controller = controller(&fetcher);
    let mut transitions = controller.transitions();

    let first = controller.start(request("a.pdf"));
    sleep(Duration::from_secs(1)).await;
    let second = controller.start(request("b.pdf"));
    assert!(second.run_id() > first.run_id());

    assert_eq!(first.finished().await, Err(DownloadError::Cancelled));
    second.finished().await.unwrap();

    sleep(Duration::from_secs(10)).await;
    let states = drain(&mut transitions);
    assert!(!states
        .iter()
        .any(|s| matches!(s, ProgressState::Error { .. })));
    assert_eq!(states.last(), Some(&ProgressState::Idle));
    assert_eq!(controller.last_request(), Some(request("b.pdf")));
}

#[tokio::test(start_paused = true)]
async fn test_watch_receiver_sees_latest_state() {
    let fetcher = ScriptedFetcher::new(vec![success(b"%PDF")]);
    let controller = controller(&fetcher);
    let mut rx = controller.subscribe();

    controller.start(request("a.pdf")).finished().await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), ProgressState::Success);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_run_surfaces_error_state() {
    // An empty script panics on the first attempt.
    let fetcher = ScriptedFetcher::new(vec![]);
    let controller = controller(&fetcher);
    let mut transitions = controller.transitions();

    let result = controller.start(request("a.pdf")).finished().await;

    assert_eq!(result, Err(DownloadError::Internal));
    let error = ProgressState::Error {
        message: UNEXPECTED_ERROR_MESSAGE.to_string(),
    };
    assert_eq!(controller.state(), error);
    assert_eq!(drain(&mut transitions), vec![ProgressState::Downloading, error]);

    controller.close();
    assert_eq!(controller.state(), ProgressState::Idle);
}
