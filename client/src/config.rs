//! View synchronization settings parsed from environment variables.
//!
//! Every timer window in the core is configurable; defaults match the
//! behaviour UI collaborators expect when nothing is set.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_SCROLL_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_RESOLVE_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 50;
pub const DEFAULT_MANUAL_GRACE_MS: u64 = 5_000;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

/// Timer windows and endpoint for one conversation view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// HTTP(S) base URL of the relay; converted to `ws(s)` at connect time.
    pub base_url: String,
    /// Quiet period before the latest local scroll position is sent.
    pub scroll_debounce: Duration,
    /// Quiet period before the viewport geometry pass runs after scrolling.
    pub resolve_debounce: Duration,
    /// Delay before resolving after the message list changes.
    pub settle_delay: Duration,
    /// How long a manual selection suppresses automatic resolution.
    pub manual_grace: Duration,
    /// Delay before reconnecting after an unexpected close.
    pub reconnect_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            scroll_debounce: Duration::from_millis(DEFAULT_SCROLL_DEBOUNCE_MS),
            resolve_debounce: Duration::from_millis(DEFAULT_RESOLVE_DEBOUNCE_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            manual_grace: Duration::from_millis(DEFAULT_MANUAL_GRACE_MS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
        }
    }
}

impl SyncConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `VIEWSYNC_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `VIEWSYNC_SCROLL_DEBOUNCE_MS`: default 100
    /// - `VIEWSYNC_RESOLVE_DEBOUNCE_MS`: default 300
    /// - `VIEWSYNC_SETTLE_DELAY_MS`: default 50
    /// - `VIEWSYNC_MANUAL_GRACE_MS`: default 5000
    /// - `VIEWSYNC_RECONNECT_DELAY_MS`: default 3000
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("VIEWSYNC_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        Self {
            base_url,
            scroll_debounce: env_millis("VIEWSYNC_SCROLL_DEBOUNCE_MS", DEFAULT_SCROLL_DEBOUNCE_MS),
            resolve_debounce: env_millis("VIEWSYNC_RESOLVE_DEBOUNCE_MS", DEFAULT_RESOLVE_DEBOUNCE_MS),
            settle_delay: env_millis("VIEWSYNC_SETTLE_DELAY_MS", DEFAULT_SETTLE_DELAY_MS),
            manual_grace: env_millis("VIEWSYNC_MANUAL_GRACE_MS", DEFAULT_MANUAL_GRACE_MS),
            reconnect_delay: env_millis("VIEWSYNC_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_parse(key, default))
}
