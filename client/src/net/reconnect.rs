//! Reconnect policy for unexpected closes.
//!
//! DESIGN
//! ======
//! The policy holds at most one pending attempt as a deadline. The view
//! actor asks it for the deadline, sleeps until then, and calls [`poll`] to
//! claim the attempt. Cancelling is just clearing the deadline, so nothing
//! can fire after the owning view is gone.
//!
//! The spacing between attempts comes from a [`ReconnectStrategy`]. The
//! default is a constant delay; [`ExponentialBackoff`] doubles up to a cap.
//!
//! [`poll`]: ReconnectPolicy::poll

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod reconnect_test;

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use super::connection::CloseCause;
use crate::timer::deadline_after;

/// Produces the delay before the next reconnect attempt.
pub trait ReconnectStrategy: Send {
    fn next_delay(&mut self) -> Duration;

    /// Called after a connection opens successfully.
    fn reset(&mut self) {}
}

/// Same delay every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl ReconnectStrategy for FixedDelay {
    fn next_delay(&mut self) -> Duration {
        self.0
    }
}

/// Doubling delay capped at `max`, reset on a successful open.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, current: base }
    }
}

impl ReconnectStrategy for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.base;
    }
}

pub struct ReconnectPolicy {
    strategy: Box<dyn ReconnectStrategy>,
    due_at: Option<Instant>,
    attempts: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(strategy: Box<dyn ReconnectStrategy>) -> Self {
        Self { strategy, due_at: None, attempts: 0 }
    }

    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self::new(Box::new(FixedDelay(delay)))
    }

    /// Schedule exactly one attempt after an unexpected close, replacing any
    /// attempt already pending. Returns the chosen delay.
    pub fn on_unexpected_close(&mut self, cause: &CloseCause, now: Instant) -> Duration {
        let delay = self.strategy.next_delay();
        self.due_at = Some(deadline_after(now, delay));
        self.attempts = self.attempts.saturating_add(1);
        info!(?cause, attempt = self.attempts, ?delay, "reconnect: scheduled");
        delay
    }

    /// The connection opened; forget the failure streak.
    pub fn on_open(&mut self) {
        self.reset();
    }

    /// Back to the initial state, e.g. when the view switches conversation.
    pub fn reset(&mut self) {
        self.strategy.reset();
        self.attempts = 0;
        self.due_at = None;
    }

    /// Claim the pending attempt if it is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.due_at {
            Some(at) if at <= now => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.due_at
    }

    /// Consecutive unexpected closes since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
