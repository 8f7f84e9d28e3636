use serde::{Deserialize, Serialize};
use stul_core::logging::LogFormat;

/// Log output settings. `RUST_LOG` still wins over `level` at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `stul_server=debug`.
    pub level: String,
    /// stderr format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
