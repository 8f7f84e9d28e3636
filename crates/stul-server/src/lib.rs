//! # stul-server
//!
//! Channel-based relay between host and client WebSocket connections.
//!
//! - Channel table built once from `name → secret` pairs
//! - Per-channel, per-role connection registries with snapshot broadcast
//! - Session state machine: authenticate (hosts), register, relay, tear down
//! - Host presence pushed to clients as `HostStatus`
//! - axum router with `/client/{channel}`, `/host/{channel}`, `/health`,
//!   `/status` and `/metrics`
//! - Graceful shutdown: one `CancellationToken` plus a tracker that drains sessions

#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use channel::{Channel, ChannelTable};
pub use config::{ServerConfig, SessionConfig};
pub use error::{AuthFailure, ReadFailure, SendError, SessionError};
pub use server::RelayServer;
pub use websocket::broadcast::{BroadcastReport, broadcast};
pub use websocket::connection::ConnectionHandle;
pub use websocket::registry::ConnectionRegistry;
pub use websocket::session::{SessionEnd, run_session};
