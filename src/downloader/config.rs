//! Download configuration constants and the run configuration passed to the
//! executor and controller at construction.

use std::time::Duration;

/// Maximum number of attempts per run, including the first one.
/// A small bound keeps a busy server from being hammered by retries.
pub const MAX_ATTEMPTS: u32 = 3;

/// Wait used when a 429 response carries no usable `Retry-After` hint.
pub const DEFAULT_WAIT_SECS: u64 = 5;

/// Delay before a success confirmation dismisses itself.
pub const SUCCESS_DISMISS_DELAY: Duration = Duration::from_secs(2);

/// Interval between countdown ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Request timeout for a single attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Retry and presentation timing for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Upper bound on attempts per run (at least 1).
    pub max_attempts: u32,
    /// Countdown tick period.
    pub tick_period: Duration,
    /// How long `Success` stays visible before auto-closing.
    pub success_dismiss_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            tick_period: TICK_PERIOD,
            success_dismiss_delay: SUCCESS_DISMISS_DELAY,
        }
    }
}

impl RetryConfig {
    /// Set the attempt bound. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Override the countdown tick period.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Override the success auto-dismiss delay.
    pub fn with_success_dismiss_delay(mut self, delay: Duration) -> Self {
        self.success_dismiss_delay = delay;
        self
    }
}
