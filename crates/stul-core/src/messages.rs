//! Messages exchanged with host and client connections.
//!
//! Once a connection is registered, every frame the relay writes to it is an
//! [`Envelope`]:
//!
//! ```json
//! {"type": "HostMessage", "data": {"foo": 1}}
//! {"type": "HostStatus", "data": {"connected": true}}
//! ```
//!
//! The `data` of `ClientMessage` / `HostMessage` is whatever JSON value the
//! sender wrote; the relay forwards it untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text notice sent to a host whose first message did not authenticate it.
pub const AUTH_FAILED_NOTICE: &str = "Authentication failed";

/// Tagged envelope delivered to registered connections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Envelope {
    /// A value sent by a client, delivered to the channel's hosts.
    ClientMessage(Value),
    /// A value sent by a host, delivered to the channel's clients.
    HostMessage(Value),
    /// Host presence for the channel, delivered to clients.
    HostStatus(HostStatus),
}

impl Envelope {
    /// Presence envelope.
    pub fn host_status(connected: bool) -> Self {
        Self::HostStatus(HostStatus { connected })
    }

    /// Wire name of the variant (the `type` field).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientMessage(_) => "ClientMessage",
            Self::HostMessage(_) => "HostMessage",
            Self::HostStatus(_) => "HostStatus",
        }
    }
}

/// Whether at least one host is connected to a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    /// `true` when the channel's host registry was non-empty at check time.
    pub connected: bool,
}

/// First message a host must send after the upgrade.
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthRequest {
    /// Channel secret.
    pub password: String,
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthRequest([REDACTED])")
    }
}
