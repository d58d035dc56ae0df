//! Manual selection override: `Auto → select → Manual → grace elapsed → Auto`.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use std::time::Duration;

use tokio::time::Instant;

use crate::timer::deadline_after;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Auto,
    Manual {
        until: Instant,
    },
}

#[derive(Debug)]
pub struct ManualSelection {
    grace: Duration,
    mode: SelectionMode,
}

impl ManualSelection {
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self { grace, mode: SelectionMode::Auto }
    }

    /// Enter (or stay in) manual mode. A repeat selection restarts the grace
    /// period; there is only ever one deadline.
    pub fn select(&mut self, now: Instant) {
        self.mode = SelectionMode::Manual { until: deadline_after(now, self.grace) };
    }

    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self.mode, SelectionMode::Manual { .. })
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.mode {
            SelectionMode::Manual { until } => Some(until),
            SelectionMode::Auto => None,
        }
    }

    /// Drop back to `Auto` if the grace period has elapsed. Returns `true`
    /// on the transition.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.mode {
            SelectionMode::Manual { until } if until <= now => {
                self.mode = SelectionMode::Auto;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.mode = SelectionMode::Auto;
    }
}
