//! Presence aggregator for remote participants of one conversation view.
//!
//! Inbound `user_scroll_position` frames are merged last-write-wins per
//! `user_id`. The first frame from an unseen user creates the entry and
//! stamps `joined_at`; the read model is ordered by `joined_at`, with arrival
//! order breaking ties so rendering stays stable.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::HashMap;

use frames::{ScrollPosition, ServerFrame};
use serde::Serialize;

/// Latest known position of one remote participant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PresenceUser {
    pub user_id: i64,
    pub username: String,
    pub scroll_position: ScrollPosition,
    /// Milliseconds since epoch when this user was first seen in the view.
    pub joined_at: i64,
    /// Milliseconds since epoch of the most recent update.
    pub last_seen: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_message_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_message_id: Option<String>,
}

/// Change notification for presence observers.
#[derive(Clone, Debug, PartialEq)]
pub enum PresenceEvent {
    Updated(PresenceUser),
    Left(i64),
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    user: PresenceUser,
}

#[derive(Debug, Default)]
pub struct PresenceAggregator {
    entries: HashMap<i64, Entry>,
    next_seq: u64,
}

impl PresenceAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one remote update and return the participant's new state.
    pub fn apply(&mut self, frame: ServerFrame, now_ms: i64) -> PresenceUser {
        let ServerFrame::UserScrollPosition {
            user_id,
            username,
            scroll_position,
            current_message_index,
            current_message_id,
        } = frame;

        let next_seq = &mut self.next_seq;
        let entry = self.entries.entry(user_id).or_insert_with(|| {
            let seq = *next_seq;
            *next_seq += 1;
            Entry {
                seq,
                user: PresenceUser {
                    user_id,
                    username: username.clone(),
                    scroll_position,
                    joined_at: now_ms,
                    last_seen: None,
                    current_message_index: None,
                    current_message_id: None,
                },
            }
        });

        let user = &mut entry.user;
        user.username = username;
        user.scroll_position = scroll_position;
        user.last_seen = Some(now_ms);
        user.current_message_index = current_message_index;
        user.current_message_id = current_message_id;
        user.clone()
    }

    /// Forget a participant. Returns whether it was known.
    pub fn remove(&mut self, user_id: i64) -> bool {
        self.entries.remove(&user_id).is_some()
    }

    /// Participants ordered by `joined_at`, then first arrival.
    #[must_use]
    pub fn list(&self) -> Vec<PresenceUser> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| (e.user.joined_at, e.seq));
        entries.into_iter().map(|e| e.user.clone()).collect()
    }

    #[must_use]
    pub fn get(&self, user_id: i64) -> Option<&PresenceUser> {
        self.entries.get(&user_id).map(|e| &e.user)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
