//! Network layer: transport abstraction, connection manager, reconnect policy.
//!
//! The websocket itself lives behind [`transport::Connector`] so the view
//! actor can be driven by an in-memory transport in tests.

pub mod connection;
pub mod reconnect;
pub mod transport;
