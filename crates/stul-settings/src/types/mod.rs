//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may set any subset of fields and the rest keep their defaults.

mod logging;
mod session;

pub use logging::LoggingSettings;
pub use session::{SessionSettings, TimeoutMode};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default bind address (all interfaces, port 8000).
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Root settings type for the relay.
///
/// ```json
/// {
///   "bind": "127.0.0.1:9000",
///   "channels": { "alpha": "s3cret" },
///   "session": { "idleTimeoutMs": 30000 }
/// }
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Socket address the HTTP listener binds to.
    pub bind: String,
    /// Channel name → host secret.
    pub channels: BTreeMap<String, String>,
    /// Per-connection timing and buffering.
    pub session: SessionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            channels: BTreeMap::new(),
            session: SessionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// Secrets stay out of debug output; only channel names are shown.
impl fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySettings")
            .field("bind", &self.bind)
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .field("session", &self.session)
            .field("logging", &self.logging)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = RelaySettings::default();
        assert_eq!(settings.bind, "0.0.0.0:8000");
        assert!(settings.channels.is_empty());
        assert_eq!(settings.session.auth_timeout_ms, 10_000);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: RelaySettings =
            serde_json::from_str(r#"{"channels":{"alpha":"s3cret"},"session":{"idleTimeoutMs":5000}}"#)
                .unwrap();
        assert_eq!(settings.bind, DEFAULT_BIND);
        assert_eq!(settings.channels["alpha"], "s3cret");
        assert_eq!(settings.session.idle_timeout_ms, 5000);
        assert_eq!(settings.session.ping_interval_ms, 20_000);
    }

    #[test]
    fn camel_case_keys() {
        let value = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(value["session"].get("authTimeoutMs").is_some());
        assert!(value["session"].get("sendQueueCapacity").is_some());
    }

    #[test]
    fn debug_hides_secrets() {
        let mut settings = RelaySettings::default();
        let _ = settings
            .channels
            .insert("alpha".into(), "topsecret".into());
        let debug = format!("{settings:?}");
        assert!(debug.contains("alpha"));
        assert!(!debug.contains("topsecret"));
    }
}
