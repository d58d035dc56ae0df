//! Shared frame model and JSON codec for the viewport presence wire.
//!
//! This crate owns the wire representation used by both the relay server and
//! the `client` core. Every frame is a single JSON object tagged by `type`.
//!
//! DESIGN
//! ======
//! - Scroll positions are captured once, at the sender, and never re-derived.
//! - Decoding distinguishes "not JSON / wrong shape" (an error the caller logs
//!   and drops) from "a `type` this side does not know" (`Ok(None)`, ignored).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// FRAME TYPES
// =============================================================================

/// `type` tag of the client → server scroll update.
pub const SCROLL_POSITION_UPDATE: &str = "scroll_position_update";

/// `type` tag of the server → client remote scroll update.
pub const USER_SCROLL_POSITION: &str = "user_scroll_position";

/// Error returned by the decode helpers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not JSON, or a known frame type carried an ill-typed payload.
    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON object has no string `type` field.
    #[error("frame is missing a string `type` field")]
    MissingType,
}

// =============================================================================
// SCROLL POSITION
// =============================================================================

/// Raw scroll container metrics as reported by the host view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    /// Distance scrolled from the top of the content.
    pub scroll_top: f64,
    /// Total content height.
    pub scroll_height: f64,
    /// Visible height of the container.
    pub client_height: f64,
}

/// A captured scroll position. `scroll_percentage` is fixed at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
    pub scroll_percentage: f64,
}

impl ScrollPosition {
    /// Capture a position from raw metrics.
    ///
    /// Returns `None` while the position is not yet meaningful: a zero or
    /// negative content height, or any non-finite metric.
    #[must_use]
    pub fn capture(metrics: ScrollMetrics) -> Option<Self> {
        let ScrollMetrics { scroll_top, scroll_height, client_height } = metrics;
        if scroll_height <= 0.0 || !scroll_height.is_finite() || !scroll_top.is_finite() || !client_height.is_finite() {
            return None;
        }
        Some(Self { scroll_top, scroll_height, client_height, scroll_percentage: scroll_top / scroll_height * 100.0 })
    }
}

// =============================================================================
// FRAMES
// =============================================================================

/// Frames sent by a client to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// The sender's settled scroll position, plus its resolved viewport message
    /// when one is known.
    ScrollPositionUpdate {
        scroll_position: ScrollPosition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_message_index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_message_id: Option<String>,
    },
}

impl ClientFrame {
    const TYPES: &'static [&'static str] = &[SCROLL_POSITION_UPDATE];

    /// Scroll update without viewport fields.
    #[must_use]
    pub fn scroll(scroll_position: ScrollPosition) -> Self {
        Self::ScrollPositionUpdate { scroll_position, current_message_index: None, current_message_id: None }
    }

    #[must_use]
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::ScrollPositionUpdate { .. } => SCROLL_POSITION_UPDATE,
        }
    }

    /// Re-address a client update as the peer-facing frame for `user_id`.
    #[must_use]
    pub fn into_user_scroll(self, user_id: i64, username: impl Into<String>) -> ServerFrame {
        match self {
            Self::ScrollPositionUpdate { scroll_position, current_message_index, current_message_id } => {
                ServerFrame::UserScrollPosition {
                    user_id,
                    username: username.into(),
                    scroll_position,
                    current_message_index,
                    current_message_id,
                }
            }
        }
    }
}

/// Frames sent by the relay to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Another participant's latest position.
    UserScrollPosition {
        user_id: i64,
        username: String,
        scroll_position: ScrollPosition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_message_index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_message_id: Option<String>,
    },
}

impl ServerFrame {
    const TYPES: &'static [&'static str] = &[USER_SCROLL_POSITION];

    #[must_use]
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::UserScrollPosition { .. } => USER_SCROLL_POSITION,
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a client frame as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Encode a server frame as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_server_frame(frame: &ServerFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a client frame. Unknown `type` values yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON or an ill-typed payload and
/// [`CodecError::MissingType`] when the object carries no `type`.
pub fn decode_client_frame(text: &str) -> Result<Option<ClientFrame>, CodecError> {
    decode_tagged(text, ClientFrame::TYPES)
}

/// Decode a server frame. Unknown `type` values yield `Ok(None)`.
///
/// # Errors
///
/// Same as [`decode_client_frame`].
pub fn decode_server_frame(text: &str) -> Result<Option<ServerFrame>, CodecError> {
    decode_tagged(text, ServerFrame::TYPES)
}

fn decode_tagged<T: DeserializeOwned>(text: &str, known: &[&str]) -> Result<Option<T>, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(CodecError::MissingType);
    };
    if !known.contains(&kind) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
