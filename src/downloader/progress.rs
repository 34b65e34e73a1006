//! Visible download state and how each state is presented.
//!
//! [`ProgressState`] is the only thing a presentation layer reads. It is
//! advanced exclusively by the
//! [`DownloadController`](super::controller::DownloadController); renderers map
//! it through [`ProgressState::view`].

use serde::Serialize;

use crate::fetcher::retry_formatter::RetryContext;

/// State of the download widget
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressState {
    /// Nothing to show
    #[default]
    Idle,
    /// An attempt is in flight
    Downloading,
    /// Waiting out a server-requested backoff
    Queued {
        /// Seconds until the next attempt
        seconds_left: u64,
        /// Attempt that was rate limited (1-based)
        attempt: u32,
        /// Attempt bound for the run
        max_attempts: u32,
    },
    /// Report saved
    Success,
    /// Run ended with a user-visible failure
    Error {
        /// Message to display
        message: String,
    },
}

impl ProgressState {
    /// Whether this state ends a run (held until closed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error { .. })
    }

    /// Lowercase state name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Queued { .. } => "queued",
            Self::Success => "success",
            Self::Error { .. } => "error",
        }
    }

    /// Presentation for this state; `None` for [`ProgressState::Idle`].
    pub fn view(&self) -> Option<ProgressView> {
        match self {
            Self::Idle => None,
            Self::Downloading => Some(ProgressView::Spinner {
                text: "Downloading report...".to_string(),
            }),
            Self::Queued {
                seconds_left,
                attempt,
                max_attempts,
            } => {
                let ctx = RetryContext {
                    attempt: *attempt,
                    max_attempts: *max_attempts,
                };
                Some(ProgressView::Countdown {
                    seconds_left: *seconds_left,
                    text: ctx.format_queued(*seconds_left),
                })
            }
            Self::Success => Some(ProgressView::Confirmation {
                text: "Report downloaded".to_string(),
            }),
            Self::Error { message } => Some(ProgressView::Failure {
                message: message.clone(),
                retry_label: "Retry".to_string(),
            }),
        }
    }
}

/// What a renderer should draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressView {
    /// Indeterminate spinner
    Spinner {
        /// Caption
        text: String,
    },
    /// Numeric countdown with attempt counter
    Countdown {
        /// Seconds until the next attempt
        seconds_left: u64,
        /// Caption including the attempt counter
        text: String,
    },
    /// Confirmation that dismisses itself
    Confirmation {
        /// Caption
        text: String,
    },
    /// Error message with a retry affordance
    Failure {
        /// Error text
        message: String,
        /// Label for the retry action
        retry_label: String,
    },
}
