//! Connection identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::Envelope;

/// Identifier assigned to a connection when it is registered.
///
/// Unique within one registry while the registration is live. It is only a
/// correlation key for removal, not a global name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a channel a connection is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authenticated controlling application.
    Host,
    /// Unauthenticated observer.
    Client,
}

impl Role {
    /// The role whose registry receives this role's messages.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Host => Self::Client,
            Self::Client => Self::Host,
        }
    }

    /// Wrap a value received from a connection of this role.
    #[must_use]
    pub fn wrap(self, payload: Value) -> Envelope {
        match self {
            Self::Host => Envelope::HostMessage(payload),
            Self::Client => Envelope::ClientMessage(payload),
        }
    }

    /// Lowercase name, used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
