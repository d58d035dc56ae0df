//! Local viewport tracking: debounced resolution plus the manual override.
//!
//! DESIGN
//! ======
//! The tracker owns the [`ViewportResolver`] and the [`ManualSelection`] and
//! produces the single live [`ViewportInfo`] for a view. Scrolls push the
//! resolve deadline out by the resolve window; message list changes pull it
//! in to the settle delay. While a manual selection is active, due
//! resolutions are discarded. When the grace period ends, one resolution
//! runs immediately so the override yields to wherever the user scrolled.
//!
//! A new [`ViewportInfo`] is only produced when the resolved index differs
//! from the last one produced, or when the manual flag has to clear.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use std::time::Duration;

use frames::ScrollMetrics;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use super::resolver::{ContainerGeometry, Extent, Resolution, ViewportResolver};
use super::selection::ManualSelection;
use crate::timer::deadline_after;

/// Which local message is in view. All-`None` until the first resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportInfo {
    pub message_index: Option<usize>,
    pub message_id: Option<String>,
    pub is_manually_selected: bool,
}

impl ViewportInfo {
    #[must_use]
    pub fn manual(message_index: usize, message_id: impl Into<String>) -> Self {
        Self { message_index: Some(message_index), message_id: Some(message_id.into()), is_manually_selected: true }
    }

    fn resolved(resolution: Resolution) -> Self {
        Self {
            message_index: Some(resolution.message_index),
            message_id: Some(resolution.message_id),
            is_manually_selected: false,
        }
    }
}

#[derive(Debug)]
pub struct ViewportTracker {
    resolver: ViewportResolver,
    selection: ManualSelection,
    info: ViewportInfo,
    last_emitted: Option<usize>,
    resolve_at: Option<Instant>,
    resolve_debounce: Duration,
    settle_delay: Duration,
}

impl ViewportTracker {
    #[must_use]
    pub fn new(resolve_debounce: Duration, settle_delay: Duration, manual_grace: Duration) -> Self {
        Self {
            resolver: ViewportResolver::new(),
            selection: ManualSelection::new(manual_grace),
            info: ViewportInfo::default(),
            last_emitted: None,
            resolve_at: None,
            resolve_debounce,
            settle_delay,
        }
    }

    #[must_use]
    pub fn info(&self) -> &ViewportInfo {
        &self.info
    }

    /// Record the container band and restart the resolve window.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) {
        self.resolver.set_container(Some(ContainerGeometry::from(metrics)));
        self.resolve_at = Some(deadline_after(now, self.resolve_debounce));
    }

    /// Replace the ordered message list and resolve once layout settles.
    pub fn on_messages_changed(&mut self, ids: &[String], now: Instant) {
        self.resolver.set_messages(ids);
        let settle = deadline_after(now, self.settle_delay);
        self.resolve_at = Some(self.resolve_at.map_or(settle, |at| at.min(settle)));
    }

    pub fn register_message(&mut self, id: &str, extent: Option<Extent>) {
        self.resolver.register_message(id, extent);
    }

    pub fn set_container(&mut self, container: Option<ContainerGeometry>) {
        self.resolver.set_container(container);
    }

    /// Pin the viewport to a message. Wins over any pending resolution.
    pub fn select(&mut self, message_index: usize, message_id: &str, now: Instant) -> ViewportInfo {
        self.selection.select(now);
        self.info = ViewportInfo::manual(message_index, message_id);
        self.last_emitted = Some(message_index);
        self.resolve_at = None;
        self.info.clone()
    }

    /// Run whatever is due. Returns the new info when it changed.
    pub fn poll(&mut self, now: Instant) -> Option<ViewportInfo> {
        let grace_ended = self.selection.expire(now);
        let due = self.resolve_at.is_some_and(|at| at <= now);
        if due {
            self.resolve_at = None;
        }
        if self.selection.is_manual() || !(due || grace_ended) {
            return None;
        }
        self.resolve_now()
    }

    fn resolve_now(&mut self) -> Option<ViewportInfo> {
        match self.resolver.try_resolve() {
            Ok(resolution) => {
                if self.last_emitted == Some(resolution.message_index) && !self.info.is_manually_selected {
                    return None;
                }
                self.last_emitted = Some(resolution.message_index);
                self.info = ViewportInfo::resolved(resolution);
                Some(self.info.clone())
            }
            Err(e) => {
                debug!(error = %e, "viewport: no resolution");
                if !self.info.is_manually_selected {
                    return None;
                }
                self.info.is_manually_selected = false;
                Some(self.info.clone())
            }
        }
    }

    /// Earliest of the resolve deadline and the grace deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match (self.resolve_at, self.selection.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.selection.is_manual()
    }

    pub fn reset(&mut self) {
        self.resolver.clear();
        self.selection.reset();
        self.info = ViewportInfo::default();
        self.last_emitted = None;
        self.resolve_at = None;
    }
}
