//! Countdown timer for server-requested backoff waits.
//!
//! The countdown is a lazy stream of remaining-second values: the starting
//! value is yielded without delay, every following value after one tick
//! period, ending with `0`.

use futures_util::stream::{self, Stream, StreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::config::TICK_PERIOD;

/// Returned when a wait is abandoned because its run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("countdown cancelled")]
pub struct Cancelled;

/// Build the tick stream for `seconds`: `seconds, seconds-1, ..., 0`.
pub fn ticks(seconds: u64, period: Duration) -> impl Stream<Item = u64> {
    stream::unfold(Some((seconds, true)), move |state| async move {
        let (remaining, first) = state?;
        if !first {
            sleep(period).await;
        }
        let next = remaining.checked_sub(1).map(|n| (n, false));
        Some((remaining, next))
    })
}

/// Per-second countdown used between rate-limited attempts.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    period: Duration,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}

impl Countdown {
    /// Create a countdown with a custom tick period.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Tick period in use.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Count down from `seconds`, reporting every value through `on_tick`.
    ///
    /// Resolves right after `0` is reported, or with [`Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn wait<F>(&self, seconds: u64, cancel: &CancellationToken, mut on_tick: F) -> Result<(), Cancelled>
    where
        F: FnMut(u64),
    {
        let ticks = ticks(seconds, self.period);
        tokio::pin!(ticks);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                next = ticks.next() => match next {
                    Some(remaining) => on_tick(remaining),
                    None => return Ok(()),
                },
            }
        }
    }
}
