use report_downloader::downloader::DownloadError;
use report_downloader::fetcher::retry_formatter::{
    format_failure, FailureKind, RetryContext, SERVER_BUSY_MESSAGE,
};

#[test]
fn queued_line_shows_seconds_and_attempt_counter() {
    let ctx = RetryContext::new(3);
    assert_eq!(
        ctx.format_queued(10),
        "Server busy - retrying in 10s (attempt 1/3)"
    );

    let ctx = ctx.next().unwrap();
    assert!(ctx.format_queued(1).ends_with("(attempt 2/3)"));
}

#[test]
fn queued_line_at_zero_says_retrying_now() {
    let ctx = RetryContext::new(3).next().unwrap();
    assert_eq!(
        ctx.format_queued(0),
        "Server busy - retrying now (attempt 2/3)"
    );
}

#[test]
fn retry_line_differs_on_final_attempt() {
    let first = RetryContext::new(2);
    assert!(first.format_retry(4).contains("before retrying"));

    let last = first.next().unwrap();
    assert!(last.is_last());
    assert_eq!(
        last.format_retry(4),
        "Rate limited on final attempt 2/2 - giving up"
    );
    assert!(last.next().is_none());
}

#[test]
fn failure_messages_include_suggestions() {
    let error = DownloadError::Exhausted { attempts: 3 };
    let text = format_failure(error.kind().unwrap(), &error.to_string());

    assert!(text.starts_with(&format!("[FAILED] {SERVER_BUSY_MESSAGE}")));
    assert!(text.contains("Reason: server busy"));
    assert!(text.contains("Suggestion: Wait a minute"));
}

#[test]
fn every_user_visible_error_has_a_kind() {
    let errors = [
        DownloadError::AuthError("a".into()),
        DownloadError::ServerError("b".into()),
        DownloadError::NetworkError("c".into()),
        DownloadError::SaveError("d".into()),
        DownloadError::Exhausted { attempts: 1 },
        DownloadError::Internal,
    ];
    let kinds: Vec<FailureKind> = errors.iter().filter_map(DownloadError::kind).collect();
    assert_eq!(
        kinds,
        vec![
            FailureKind::SessionExpired,
            FailureKind::ServerError,
            FailureKind::NetworkError,
            FailureKind::SaveFailed,
            FailureKind::ServerBusy,
            FailureKind::Internal,
        ]
    );
}
