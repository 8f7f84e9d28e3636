//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If a settings file exists, deep-merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Environment variables:
//!
//! | variable | field |
//! |---|---|
//! | `BIND` | `bind` (`:port` means all interfaces) |
//! | `AUTH` | `channels` (`chan:secret,chan2:secret2`, merged over the file) |
//! | `STUL_AUTH_TIMEOUT_MS` | `session.authTimeoutMs` |
//! | `STUL_IDLE_TIMEOUT_MS` | `session.idleTimeoutMs` |
//! | `STUL_TIMEOUT_MODE` | `session.timeoutMode` |
//! | `STUL_PING_INTERVAL_MS` | `session.pingIntervalMs` |
//! | `STUL_WRITE_TIMEOUT_MS` | `session.writeTimeoutMs` |
//! | `STUL_SEND_QUEUE` | `session.sendQueueCapacity` |
//! | `STUL_LOG_LEVEL` | `logging.level` |
//! | `STUL_LOG_FORMAT` | `logging.format` |

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{RelaySettings, SessionSettings, TimeoutMode};

const AUTH_TIMEOUT_MS: (u64, u64) = (100, 600_000);
const IDLE_TIMEOUT_MS: (u64, u64) = (100, 86_400_000);
const PING_INTERVAL_MS: (u64, u64) = (100, 3_600_000);
const WRITE_TIMEOUT_MS: (u64, u64) = (100, 600_000);
const SEND_QUEUE: (u64, u64) = (1, 1_000_000);

/// Load settings from an optional file, reading overrides through `env`.
///
/// A missing file yields defaults; a file with invalid JSON or with session
/// values out of range is an error.
pub fn load_settings_with<F>(path: Option<&Path>, env: F) -> Result<RelaySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = match path {
        Some(path) if path.exists() => {
            debug!(?path, "loading settings from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        Some(path) => {
            debug!(?path, "settings file not found, using defaults");
            defaults
        }
        None => defaults,
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    validate_session(&settings.session)?;
    apply_env_overrides(&mut settings, env)?;
    Ok(settings)
}

/// Check session values against the ranges the environment overrides accept.
pub fn validate_session(session: &SessionSettings) -> Result<()> {
    let checks = [
        ("authTimeoutMs", session.auth_timeout_ms, AUTH_TIMEOUT_MS),
        ("idleTimeoutMs", session.idle_timeout_ms, IDLE_TIMEOUT_MS),
        ("pingIntervalMs", session.ping_interval_ms, PING_INTERVAL_MS),
        ("writeTimeoutMs", session.write_timeout_ms, WRITE_TIMEOUT_MS),
        (
            "sendQueueCapacity",
            u64::try_from(session.send_queue_capacity).unwrap_or(u64::MAX),
            SEND_QUEUE,
        ),
    ];
    for (key, value, (min, max)) in checks {
        if !(min..=max).contains(&value) {
            return Err(SettingsError::InvalidValue(format!(
                "session.{key} = {value} is outside {min}..={max}"
            )));
        }
    }
    if session.max_message_size == 0 {
        return Err(SettingsError::InvalidValue(
            "session.maxMessageSize must be positive".into(),
        ));
    }
    Ok(())
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `env`.
///
/// Numeric and enum values out of range are warned about and ignored. A
/// malformed `AUTH` value is an error, since it would silently drop channels.
pub fn apply_env_overrides<F>(settings: &mut RelaySettings, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = read("BIND") {
        settings.bind = normalize_bind(&v);
    }
    if let Some(v) = read("AUTH") {
        for (channel, secret) in parse_auth_keys(&v)? {
            let _ = settings.channels.insert(channel, secret);
        }
    }

    let session = &mut settings.session;
    if let Some(v) = read_u64(&read, "STUL_AUTH_TIMEOUT_MS", AUTH_TIMEOUT_MS) {
        session.auth_timeout_ms = v;
    }
    if let Some(v) = read_u64(&read, "STUL_IDLE_TIMEOUT_MS", IDLE_TIMEOUT_MS) {
        session.idle_timeout_ms = v;
    }
    if let Some(v) = read("STUL_TIMEOUT_MODE") {
        match parse_timeout_mode(&v) {
            Some(mode) => session.timeout_mode = mode,
            None => warn!(key = "STUL_TIMEOUT_MODE", value = %v, "invalid timeout mode, ignoring"),
        }
    }
    if let Some(v) = read_u64(&read, "STUL_PING_INTERVAL_MS", PING_INTERVAL_MS) {
        session.ping_interval_ms = v;
    }
    if let Some(v) = read_u64(&read, "STUL_WRITE_TIMEOUT_MS", WRITE_TIMEOUT_MS) {
        session.write_timeout_ms = v;
    }
    if let Some(v) = read_u64(&read, "STUL_SEND_QUEUE", SEND_QUEUE) {
        session.send_queue_capacity = usize::try_from(v).unwrap_or(usize::MAX);
    }

    if let Some(v) = read("STUL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("STUL_LOG_FORMAT") {
        match v.parse() {
            Ok(format) => settings.logging.format = format,
            Err(e) => warn!(key = "STUL_LOG_FORMAT", error = %e, "invalid log format, ignoring"),
        }
    }
    Ok(())
}

/// Expand a bare `:port` to `0.0.0.0:port`; other values are only trimmed.
pub fn normalize_bind(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    }
}

/// Parse an `AUTH` value of the form `chan:secret,chan2:secret2`.
///
/// Empty entries are skipped and whitespace around names and secrets is
/// trimmed. Each entry splits at its first `:`, so secrets may contain `:`.
pub fn parse_auth_keys(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut keys = BTreeMap::new();
    for part in raw.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let Some((channel, secret)) = part.split_once(':') else {
            return Err(SettingsError::InvalidValue(format!(
                "AUTH entry {:?} is missing a ':secret' part",
                part.trim()
            )));
        };
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(SettingsError::InvalidValue(
                "AUTH entry has an empty channel name".into(),
            ));
        }
        let _ = keys.insert(channel.to_string(), secret.trim().to_string());
    }
    Ok(keys)
}

/// Parse a timeout mode name (`idle` or `lifetime`, case-insensitive).
pub fn parse_timeout_mode(val: &str) -> Option<TimeoutMode> {
    match val.trim().to_ascii_lowercase().as_str() {
        "idle" => Some(TimeoutMode::Idle),
        "lifetime" => Some(TimeoutMode::Lifetime),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_u64<F>(read: &F, name: &str, (min, max): (u64, u64)) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let val = read(name)?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid numeric env var, ignoring");
    }
    result
}
