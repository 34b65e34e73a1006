//! User-facing retry and failure messages.
//!
//! Keeps every string the operator sees in one place so the CLI renderer, the
//! log lines and the error variants agree on wording.

/// Shown when the server rejects the credential.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Shown when no response could be obtained.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Could not reach the report server. Check your connection and try again.";

/// Shown when an error response carries no readable message.
pub const GENERIC_SERVER_MESSAGE: &str = "The server could not generate the report.";

/// Shown when every attempt was rate limited.
pub const SERVER_BUSY_MESSAGE: &str = "The server is busy. Please try again later.";

/// Shown when a run stopped on a bug rather than a server answer.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Something went wrong while downloading the report.";

/// Classification of user-visible failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 401/403
    SessionExpired,
    /// Non-success status other than 401/403/429
    ServerError,
    /// Connectivity, DNS, timeout
    NetworkError,
    /// Fetched but not persisted
    SaveFailed,
    /// Retry budget spent on 429s
    ServerBusy,
    /// The run itself failed
    Internal,
}

impl FailureKind {
    /// Short description used in log lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::SessionExpired => "authentication failed",
            Self::ServerError => "server error",
            Self::NetworkError => "network error",
            Self::SaveFailed => "local save failed",
            Self::ServerBusy => "server busy",
            Self::Internal => "internal error",
        }
    }

    /// Suggested remediation shown under the error.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SessionExpired => "Log in again, then retry",
            Self::ServerError => "Check the report parameters or contact support if it persists",
            Self::NetworkError => "Verify internet connectivity and DNS resolution",
            Self::SaveFailed => "Check free disk space and write permissions for the target directory",
            Self::ServerBusy => "Wait a minute before retrying",
            Self::Internal => "Retry the download and report the problem if it keeps happening",
        }
    }
}

/// Attempt bookkeeping for one orchestrator run.
///
/// Invariant: `1 <= attempt <= max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts for the run
    pub max_attempts: u32,
}

impl RetryContext {
    /// Start a run at attempt 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Move to the next attempt, or `None` once the bound is reached.
    pub fn next(self) -> Option<Self> {
        (self.attempt < self.max_attempts).then_some(Self {
            attempt: self.attempt + 1,
            ..self
        })
    }

    /// Whether this is the final permitted attempt.
    pub fn is_last(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Countdown line shown while queued. At zero the next attempt is
    /// already being issued.
    pub fn format_queued(&self, seconds_left: u64) -> String {
        if seconds_left == 0 {
            format!(
                "Server busy - retrying now (attempt {}/{})",
                self.attempt, self.max_attempts
            )
        } else {
            format!(
                "Server busy - retrying in {seconds_left}s (attempt {}/{})",
                self.attempt, self.max_attempts
            )
        }
    }

    /// Log line for a rate-limited attempt.
    pub fn format_retry(&self, wait_secs: u64) -> String {
        if self.is_last() {
            format!(
                "Rate limited on final attempt {}/{} - giving up",
                self.attempt, self.max_attempts
            )
        } else {
            format!(
                "Rate limited (attempt {}/{}) - waiting {wait_secs} seconds before retrying",
                self.attempt, self.max_attempts
            )
        }
    }

    /// Log line when an attempt after a backoff succeeds.
    pub fn format_success(&self) -> String {
        format!(
            "Attempt {}/{} succeeded - report downloaded",
            self.attempt, self.max_attempts
        )
    }
}

/// Multi-line failure summary with a remediation hint.
pub fn format_failure(kind: FailureKind, message: &str) -> String {
    [
        format!("[FAILED] {message}"),
        format!("  Reason: {}", kind.description()),
        format!("  Suggestion: {}", kind.suggestion()),
    ]
    .join("\n")
}
