//! Per-attempt time budget
// (c) 2024 Ross Younger

use std::time::Duration;

use tokio::time::Instant;

/// Time allotted to one transmission attempt.
///
/// The budget runs from the moment the attempt started. Anything that happens while
/// waiting (including the arrival of replies we have no use for) consumes it; only a
/// new attempt gets a fresh one.
#[derive(Debug, Clone, Copy)]
pub struct AttemptBudget {
    total: Duration,
    started: Instant,
}

impl AttemptBudget {
    /// Starts a budget of `total` at `now`
    #[must_use]
    pub fn start(total: Duration, now: Instant) -> Self {
        Self {
            total,
            started: now,
        }
    }

    /// How long has this attempt been going?
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Time left at `now`, or None if the budget is spent
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.total
            .checked_sub(self.elapsed(now))
            .filter(|d| !d.is_zero())
    }
}
