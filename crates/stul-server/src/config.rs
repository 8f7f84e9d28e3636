//! Server configuration.

use std::time::Duration;

use stul_settings::{DEFAULT_BIND, RelaySettings, SessionSettings, TimeoutMode};

/// Shortest ping period a writer will use.
pub const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Per-connection timing and buffering used by sessions and writers.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long a host has to send its auth message.
    pub auth_timeout: Duration,
    /// Receive wait while relaying.
    pub idle_timeout: Duration,
    /// Whether `idle_timeout` restarts per frame or caps the connection.
    pub timeout_mode: TimeoutMode,
    /// Interval between server Ping frames.
    pub ping_interval: Duration,
    /// Upper bound for one frame write.
    pub write_timeout: Duration,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(s: &SessionSettings) -> Self {
        Self {
            auth_timeout: s.auth_timeout(),
            idle_timeout: s.idle_timeout(),
            timeout_mode: s.timeout_mode,
            ping_interval: s.ping_interval().max(MIN_PING_INTERVAL),
            write_timeout: s.write_timeout(),
            send_queue_capacity: s.send_queue_capacity.max(1),
            max_message_size: s.max_message_size,
        }
    }
}

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Socket address to bind (port `0` picks a free port).
    pub bind: String,
    /// Session parameters.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl From<&RelaySettings> for ServerConfig {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            bind: settings.bind.clone(),
            session: SessionConfig::from(&settings.session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind, "0.0.0.0:8000");
        assert_eq!(cfg.session.auth_timeout, Duration::from_secs(10));
        assert_eq!(cfg.session.idle_timeout, Duration::from_secs(60));
        assert_eq!(cfg.session.timeout_mode, TimeoutMode::Idle);
        assert_eq!(cfg.session.send_queue_capacity, 256);
    }

    #[test]
    fn from_settings() {
        let mut settings = RelaySettings::default();
        settings.bind = "127.0.0.1:0".into();
        settings.session.write_timeout_ms = 1500;
        settings.session.timeout_mode = TimeoutMode::Lifetime;
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.bind, "127.0.0.1:0");
        assert_eq!(cfg.session.write_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.session.timeout_mode, TimeoutMode::Lifetime);
    }

    #[test]
    fn zero_queue_capacity_clamped() {
        let settings = SessionSettings {
            send_queue_capacity: 0,
            ..SessionSettings::default()
        };
        assert_eq!(SessionConfig::from(&settings).send_queue_capacity, 1);
    }

    #[test]
    fn zero_ping_interval_clamped() {
        let settings = SessionSettings {
            ping_interval_ms: 0,
            ..SessionSettings::default()
        };
        assert_eq!(SessionConfig::from(&settings).ping_interval, MIN_PING_INTERVAL);
    }
}
