//! Retry loop behaviour against scripted attempt outcomes

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use report_downloader::downloader::{DownloadError, DownloadExecutor, RetryConfig};
use report_downloader::fetcher::DownloadOutcome;

use crate::support::{rate_limited, request, success, ticks, Event, RecordingObserver, ScriptedFetcher};

fn queued(wait_secs: u64, attempt: u32, max_attempts: u32) -> Event {
    Event::Queued {
        wait_secs,
        attempt,
        max_attempts,
    }
}

#[tokio::test(start_paused = true)]
async fn test_all_rate_limited_exhausts_after_max_attempts() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(1), rate_limited(1), rate_limited(1)]);
    let executor = DownloadExecutor::new(fetcher.clone());
    let mut observer = RecordingObserver::new(fetcher.log());
    let started = Instant::now();

    let result = executor
        .execute(&request("a.pdf"), &CancellationToken::new(), &mut observer)
        .await;

    assert_eq!(result, Err(DownloadError::Exhausted { attempts: 3 }));
    assert_eq!(fetcher.call_count(), 3);

    // The third 429 ends the run; no countdown follows it.
    let mut expected = vec![Event::Attempt(1), queued(1, 1, 3)];
    expected.extend(ticks(1));
    expected.extend([Event::Attempt(2), queued(1, 2, 3)]);
    expected.extend(ticks(1));
    expected.push(Event::Attempt(3));
    assert_eq!(fetcher.events(), expected);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(
        result.unwrap_err().to_string(),
        "The server is busy. Please try again later."
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_outcomes_end_after_one_attempt() {
    let cases = [
        (
            DownloadOutcome::AuthError {
                message: "expired".to_string(),
            },
            DownloadError::AuthError("expired".to_string()),
        ),
        (
            DownloadOutcome::ServerError {
                message: "template missing".to_string(),
            },
            DownloadError::ServerError("template missing".to_string()),
        ),
        (
            DownloadOutcome::NetworkError {
                message: "offline".to_string(),
            },
            DownloadError::NetworkError("offline".to_string()),
        ),
        (
            DownloadOutcome::SaveFailed {
                message: "disk full".to_string(),
            },
            DownloadError::SaveError("disk full".to_string()),
        ),
    ];

    for (outcome, expected) in cases {
        let fetcher = ScriptedFetcher::new(vec![outcome]);
        let executor = DownloadExecutor::new(fetcher.clone());
        let mut observer = RecordingObserver::new(fetcher.log());
        let started = Instant::now();

        let result = executor
            .execute(&request("a.pdf"), &CancellationToken::new(), &mut observer)
            .await;

        assert_eq!(result, Err(expected));
        assert_eq!(fetcher.events(), vec![Event::Attempt(1)]);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_to_zero_before_next_attempt() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(4), success(b"pdf")]);
    let executor = DownloadExecutor::new(fetcher.clone());
    let mut observer = RecordingObserver::new(fetcher.log());
    let started = Instant::now();

    let summary = executor
        .execute(&request("a.pdf"), &CancellationToken::new(), &mut observer)
        .await
        .unwrap();

    let mut expected = vec![Event::Attempt(1), queued(4, 1, 3)];
    expected.extend(ticks(4));
    expected.push(Event::Attempt(2));
    assert_eq!(fetcher.events(), expected);
    assert_eq!(summary.attempts, 2);
    assert_eq!(started.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_zero_wait_retries_without_delay() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(0), success(b"pdf")]);
    let executor = DownloadExecutor::new(fetcher.clone());
    let mut observer = RecordingObserver::new(fetcher.log());
    let started = Instant::now();

    executor
        .execute(&request("a.pdf"), &CancellationToken::new(), &mut observer)
        .await
        .unwrap();

    assert_eq!(
        fetcher.events(),
        vec![
            Event::Attempt(1),
            queued(0, 1, 3),
            Event::Tick(0),
            Event::Attempt(2)
        ]
    );
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_two_hints_then_success_sequence() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(10), rate_limited(3), success(b"pdf")]);
    let executor = DownloadExecutor::new(fetcher.clone());
    let mut observer = RecordingObserver::new(fetcher.log());
    let started = Instant::now();

    let summary = executor
        .execute(&request("a.pdf"), &CancellationToken::new(), &mut observer)
        .await
        .unwrap();

    let mut expected = vec![Event::Attempt(1), queued(10, 1, 3)];
    expected.extend(ticks(10));
    expected.extend([Event::Attempt(2), queued(3, 2, 3)]);
    expected.extend(ticks(3));
    expected.push(Event::Attempt(3));
    assert_eq!(fetcher.events(), expected);
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.bytes, 3);
    assert_eq!(started.elapsed(), Duration::from_secs(13));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_budget_exhausts_immediately() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(2)]);
    let executor = DownloadExecutor::new(fetcher.clone())
        .with_config(RetryConfig::default().with_max_attempts(1));
    let mut observer = RecordingObserver::new(fetcher.log());
    let started = Instant::now();

    let result = executor
        .execute(&request("a.pdf"), &CancellationToken::new(), &mut observer)
        .await;

    assert_eq!(result, Err(DownloadError::Exhausted { attempts: 1 }));
    assert_eq!(fetcher.events(), vec![Event::Attempt(1)]);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_countdown_stops_further_attempts() {
    let fetcher = ScriptedFetcher::new(vec![rate_limited(30), success(b"pdf")]);
    let executor = DownloadExecutor::new(fetcher.clone());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            cancel.cancel();
        })
    };

    let mut observer = RecordingObserver::new(fetcher.log());
    let result = executor
        .execute(&request("a.pdf"), &cancel, &mut observer)
        .await;
    canceller.await.unwrap();

    assert_eq!(result, Err(DownloadError::Cancelled));
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(
        fetcher.events(),
        vec![
            Event::Attempt(1),
            queued(30, 1, 3),
            Event::Tick(30),
            Event::Tick(29),
            Event::Tick(28)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_in_flight_attempt() {
    let fetcher = ScriptedFetcher::with_delays(vec![(Duration::from_secs(30), success(b"pdf"))]);
    let cancel = CancellationToken::new();

    let run = {
        let cancel = cancel.clone();
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            let executor = DownloadExecutor::new(fetcher);
            let mut observer = RecordingObserver::new(Default::default());
            executor.execute(&request("a.pdf"), &cancel, &mut observer).await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    let started = Instant::now();

    assert_eq!(run.await.unwrap(), Err(DownloadError::Cancelled));
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(fetcher.call_count(), 1);
}
