//! Connection retry supervisor
//!
//! Pure state machine for the delivery loop's reconnect policy:
//!
//! - **Idle**: never connected yet
//! - **Connected**: a dispatch session is live
//! - **BackingOff**: last session failed, waiting before the next attempt
//! - **Failed**: the retry budget is exhausted, terminal
//!
//! Wait time for consecutive failure `n` (1-based) is `min(60, 2^n)`
//! seconds; each of the first `max_attempts` failures is retried, the one
//! after that makes the machine `Failed`, and `Failed` is sticky. A
//! successful connect resets the counter.
//! The machine never sleeps itself, so the timing is unit-testable.

use std::time::Duration;
use tracing::{debug, error, info};

const MAX_BACKOFF_SECS: u64 = 60;

/// Supervisor states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Connected,
    BackingOff,
    Failed,
}

/// What the delivery loop should do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then reconnect
    Retry(Duration),
    /// Budget exhausted, stop for good
    GiveUp,
}

/// Bounded exponential-backoff supervisor
#[derive(Debug)]
pub struct Supervisor {
    state: State,
    failures: u32,
    max_attempts: u32,
}

impl Supervisor {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: State::Idle,
            failures: 0,
            max_attempts,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Consecutive failures since the last successful connect
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Attempt number for the next connection try (1-based)
    pub fn attempt(&self) -> u32 {
        self.failures + 1
    }

    /// A dispatch session came up; the failure streak resets
    pub fn on_connect(&mut self) {
        if self.failures > 0 {
            info!("Reconnected after {} failed attempt(s)", self.failures);
        }
        self.failures = 0;
        self.transition(State::Connected);
    }

    /// A connection-level failure occurred. Returns the backoff decision;
    /// `GiveUp` is sticky: the machine is `Failed` and further calls keep
    /// returning `GiveUp`.
    pub fn on_failure(&mut self) -> RetryDecision {
        if self.state == State::Failed {
            return RetryDecision::GiveUp;
        }
        self.failures += 1;
        if self.failures > self.max_attempts {
            error!(
                "Max retries ({}) reached. Bot will not restart automatically.",
                self.max_attempts
            );
            self.transition(State::Failed);
            return RetryDecision::GiveUp;
        }
        let secs = 2u64
            .checked_pow(self.failures)
            .unwrap_or(MAX_BACKOFF_SECS)
            .min(MAX_BACKOFF_SECS);
        self.transition(State::BackingOff);
        RetryDecision::Retry(Duration::from_secs(secs))
    }

    fn transition(&mut self, new_state: State) {
        if self.state != new_state {
            debug!("Supervisor: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_then_stop() {
        let mut sup = Supervisor::new(5);
        let mut waits = Vec::new();
        loop {
            match sup.on_failure() {
                RetryDecision::Retry(d) => waits.push(d.as_secs()),
                RetryDecision::GiveUp => break,
            }
        }
        // failures 1..5 are each retried; the sixth is not
        assert_eq!(waits, vec![2, 4, 8, 16, 32]);
        assert_eq!(sup.state(), State::Failed);
        assert_eq!(sup.on_failure(), RetryDecision::GiveUp);
    }

    #[test]
    fn test_cap_at_sixty_seconds() {
        let mut sup = Supervisor::new(20);
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            if let RetryDecision::Retry(d) = sup.on_failure() {
                last = d;
            }
        }
        assert_eq!(last, Duration::from_secs(60));
    }

    #[test]
    fn test_connect_resets_streak() {
        let mut sup = Supervisor::new(5);
        assert_eq!(sup.on_failure(), RetryDecision::Retry(Duration::from_secs(2)));
        assert_eq!(sup.on_failure(), RetryDecision::Retry(Duration::from_secs(4)));
        sup.on_connect();
        assert_eq!(sup.state(), State::Connected);
        assert_eq!(sup.failures(), 0);
        assert_eq!(sup.on_failure(), RetryDecision::Retry(Duration::from_secs(2)));
    }

    #[test]
    fn test_starts_idle() {
        let sup = Supervisor::new(5);
        assert_eq!(sup.state(), State::Idle);
        assert_eq!(sup.attempt(), 1);
    }
}
