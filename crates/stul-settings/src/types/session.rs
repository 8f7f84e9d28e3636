use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the receive wait of a relaying session is bounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutMode {
    /// The wait restarts after every received frame; only silent peers expire.
    #[default]
    Idle,
    /// A single deadline anchored at accept caps the whole connection.
    Lifetime,
}

/// Per-connection timing and buffering.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// How long a host has to send its auth message.
    pub auth_timeout_ms: u64,
    /// Receive wait (per frame in `idle` mode, total in `lifetime` mode).
    pub idle_timeout_ms: u64,
    /// Interpretation of `idle_timeout_ms`.
    pub timeout_mode: TimeoutMode,
    /// Interval between server Ping frames.
    pub ping_interval_ms: u64,
    /// Upper bound for one frame write.
    pub write_timeout_ms: u64,
    /// Outbound frames buffered per connection before sends are dropped.
    pub send_queue_capacity: usize,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auth_timeout_ms: 10_000,
            idle_timeout_ms: 60_000,
            timeout_mode: TimeoutMode::Idle,
            ping_interval_ms: 20_000,
            write_timeout_ms: 10_000,
            send_queue_capacity: 256,
            max_message_size: 1024 * 1024,
        }
    }
}

impl SessionSettings {
    /// Auth wait as a [`Duration`].
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    /// Receive wait as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Ping interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Write bound as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
