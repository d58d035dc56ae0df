//! Debounced local scroll emitter.
//!
//! Every scroll replaces the cached position and pushes the single pending
//! deadline out by one window. When the deadline passes, the actor polls the
//! emitter and sends whatever position was cached last. Intermediate
//! positions are overwritten, never queued.

#[cfg(test)]
#[path = "emitter_test.rs"]
mod emitter_test;

use std::time::Duration;

use frames::{ClientFrame, ScrollMetrics, ScrollPosition};
use tokio::time::Instant;

use crate::state::viewport::ViewportInfo;
use crate::timer::deadline_after;

#[derive(Debug)]
pub struct ScrollEmitter {
    window: Duration,
    latest: Option<ScrollPosition>,
    due_at: Option<Instant>,
}

impl ScrollEmitter {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, latest: None, due_at: None }
    }

    /// Capture `metrics`, cache the position and restart the window.
    ///
    /// Metrics without a meaningful position leave both the cache and the
    /// pending deadline untouched.
    pub fn handle_scroll(&mut self, metrics: ScrollMetrics, now: Instant) -> Option<ScrollPosition> {
        let position = ScrollPosition::capture(metrics)?;
        self.latest = Some(position);
        self.due_at = Some(deadline_after(now, self.window));
        Some(position)
    }

    /// Schedule a resend of the cached position, e.g. after the viewport
    /// changed. No-op until a position has been captured.
    pub fn rearm(&mut self, now: Instant) {
        if self.latest.is_some() {
            self.due_at = Some(deadline_after(now, self.window));
        }
    }

    /// Take the position to send if the window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<ScrollPosition> {
        match self.due_at {
            Some(at) if at <= now => {
                self.due_at = None;
                self.latest
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.due_at
    }

    #[must_use]
    pub fn latest(&self) -> Option<ScrollPosition> {
        self.latest
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    pub fn reset(&mut self) {
        self.latest = None;
        self.due_at = None;
    }
}

/// Outbound frame for `position`, carrying the resolved viewport when known.
#[must_use]
pub fn scroll_frame(position: ScrollPosition, viewport: &ViewportInfo) -> ClientFrame {
    ClientFrame::ScrollPositionUpdate {
        scroll_position: position,
        current_message_index: viewport.message_index,
        current_message_id: viewport.message_id.clone(),
    }
}
