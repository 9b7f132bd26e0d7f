//! Poll-loop timing

use std::time::Duration;
use tokio::time::Instant;

/// A fixed point in time a poll loop must not wait past
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline {
    end: Instant,
}

impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        Self {
            end: Instant::now() + timeout,
        }
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }

    /// Sleep for `interval`, cut short at the deadline.
    ///
    /// Returns `false` without sleeping once the deadline has passed, so
    /// the caller gets one last poll exactly at the deadline.
    pub(crate) async fn pause(&self, interval: Duration) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(interval.min(remaining)).await;
        true
    }
}
