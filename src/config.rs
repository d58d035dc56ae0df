//! Relay configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_QUEUE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    /// Raw `token=user_id:username` list; parsed by [`crate::auth::StaticTokens`].
    pub tokens: String,
    /// Outbound frames buffered per client before updates to it are dropped.
    pub client_queue: usize,
}

impl RelayConfig {
    /// Build relay config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `VIEWSYNC_TOKENS`: comma-separated `token=user_id:username`, default empty
    /// - `VIEWSYNC_CLIENT_QUEUE`: default 256 (minimum 1)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            tokens: std::env::var("VIEWSYNC_TOKENS").unwrap_or_default(),
            client_queue: env_parse("VIEWSYNC_CLIENT_QUEUE", DEFAULT_CLIENT_QUEUE).max(1),
        }
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
