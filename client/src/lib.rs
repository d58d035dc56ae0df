//! Viewport presence core for conversation views.
//!
//! ARCHITECTURE
//! ============
//! Each open conversation view is one [`session::ViewSession`] actor task.
//! The actor exclusively owns the connection, the scroll emitter, the
//! viewport tracker, the presence aggregator and the reconnect policy. UI
//! code talks to it through a [`session::ViewHandle`]: commands go in over a
//! channel, read models come out through `watch` channels.
//!
//! ```text
//! handle_scroll ─▶ ScrollEmitter ─▶ ConnectionHandle ─▶ relay
//!                                                        │
//! present_users ◀─ PresenceAggregator ◀─ ConnectionEvent ◀┘
//! ```

pub mod config;
pub mod emitter;
pub mod error;
pub mod net;
pub mod session;
pub mod state;
pub mod timer;

pub use config::SyncConfig;
pub use error::{ConnectError, GeometryError, TransportError};
pub use frames::{ScrollMetrics, ScrollPosition};
pub use net::connection::{ConnectionState, ConversationId};
pub use net::reconnect::{ExponentialBackoff, FixedDelay, ReconnectPolicy, ReconnectStrategy};
pub use net::transport::{Connector, WsConnector};
pub use session::{ViewHandle, ViewSession};
pub use state::presence::{PresenceEvent, PresenceUser};
pub use state::resolver::{ContainerGeometry, Extent};
pub use state::viewport::ViewportInfo;
