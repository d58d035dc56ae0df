//! Bearer token verification for websocket upgrades.
//!
//! Token issuance belongs to the host application's auth system. The relay
//! only maps a presented token to an [`Identity`] through a
//! [`TokenVerifier`]. [`StaticTokens`] is the built-in verifier, loaded from
//! `VIEWSYNC_TOKENS`.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::collections::HashMap;

use async_trait::async_trait;

/// The authenticated participant behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown token")]
    UnknownToken,
    #[error("malformed token entry: {0}")]
    MalformedEntry(String),
    #[error("token backend unavailable: {0}")]
    Backend(String),
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolve `token` to the identity it was issued for.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, Identity>,
}

impl StaticTokens {
    /// Parse `token=user_id:username` entries separated by commas. Blank
    /// entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedEntry`] for an entry missing `=` or `:`,
    /// with a non-integer user id, or with an empty token or username.
    pub fn parse(entries: &str) -> Result<Self, AuthError> {
        let mut tokens = HashMap::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let malformed = || AuthError::MalformedEntry(entry.to_owned());
            let (token, who) = entry.split_once('=').ok_or_else(malformed)?;
            let (user_id, username) = who.split_once(':').ok_or_else(malformed)?;
            let user_id: i64 = user_id.trim().parse().map_err(|_| malformed())?;
            let (token, username) = (token.trim(), username.trim());
            if token.is_empty() || username.is_empty() {
                return Err(malformed());
            }
            tokens.insert(token.to_owned(), Identity { user_id, username: username.to_owned() });
        }
        Ok(Self { tokens })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: i64, username: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), Identity { user_id, username: username.into() });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokens {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::UnknownToken)
    }
}
