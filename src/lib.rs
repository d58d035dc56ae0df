//! Conversation presence relay.
//!
//! SYSTEM CONTEXT
//! ==============
//! Clients viewing the same conversation connect to
//! `/api/ws/conversations/{id}?token=...`. Each `scroll_position_update` a
//! client sends is re-addressed with the authenticated user and fanned out
//! to every other client in that conversation as `user_scroll_position`.
//! Nothing is persisted; rooms exist only while someone is connected.

pub mod auth;
pub mod config;
pub mod routes;
pub mod services;
pub mod state;
