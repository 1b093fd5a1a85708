//! Exponential restart backoff for link supervisors.

use std::time::Duration;

use crate::config::RestartPolicy;

/// Restart budget and delay schedule for one link.
///
/// Delays start at `initial_backoff` and double after every failure, capped
/// at `max_backoff`. After `max_restarts` consecutive failures
/// [`next_delay`](Self::next_delay) returns `None`. A generation that stayed
/// up for at least `healthy_after` resets the budget.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RestartPolicy,
    failures: u32,
    next: Duration,
}

impl Backoff {
    /// Fresh budget for `policy`.
    #[must_use]
    pub fn new(policy: RestartPolicy) -> Self {
        let next = policy.initial_backoff();
        Self {
            policy,
            failures: 0,
            next,
        }
    }

    /// Consecutive failures counted so far.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Note how long the last generation ran; long runs reset the budget.
    pub fn record_run(&mut self, ran_for: Duration) {
        if ran_for >= self.policy.healthy_after() {
            self.reset();
        }
    }

    /// Count a failure and return the delay before the next attempt, or
    /// `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.failures >= self.policy.max_restarts {
            return None;
        }
        self.failures += 1;
        let delay = self.next;
        self.next = self
            .next
            .saturating_mul(2)
            .min(self.policy.max_backoff());
        Some(delay)
    }

    /// Restore the full budget and the initial delay.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.next = self.policy.initial_backoff();
    }
}
