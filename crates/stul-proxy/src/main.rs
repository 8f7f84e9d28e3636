//! # stul-proxy
//!
//! Relay binary: loads settings, builds the channel table and serves the
//! host/client WebSocket endpoints until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use stul_core::logging::init_subscriber;
use stul_server::{ChannelTable, RelayServer, ServerConfig};
use stul_settings::RelaySettings;

/// Channel relay between host and client WebSocket connections.
#[derive(Parser, Debug)]
#[command(name = "stul-proxy", about = "Channel relay between host and client WebSocket connections")]
struct Cli {
    /// JSON settings file. Missing files fall back to defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides settings and `BIND`).
    #[arg(long)]
    bind: Option<String>,

    /// Log filter (overrides settings and `STUL_LOG_LEVEL`).
    #[arg(long)]
    log_level: Option<String>,

    /// Do not install the Prometheus recorder.
    #[arg(long)]
    no_metrics: bool,
}

/// Settings with CLI flags applied on top of file and environment.
fn resolve_settings<F>(cli: &Cli, env: F) -> Result<RelaySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = stul_settings::load_settings_with(cli.config.as_deref(), env)
        .context("failed to load settings")?;
    if let Some(bind) = &cli.bind {
        settings.bind = stul_settings::normalize_bind(bind);
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    Ok(settings)
}

/// Channel table from settings. Having no channel at all is fatal.
fn build_channels(settings: &RelaySettings) -> Result<ChannelTable> {
    if settings.channels.is_empty() {
        bail!("no channels configured, make sure AUTH is set");
    }
    for name in settings.channels.keys() {
        tracing::info!(channel = %name, "added channel");
    }
    Ok(ChannelTable::new(settings.channels.clone()))
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("failed to listen for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli, |name| std::env::var(name).ok())?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    let channels = build_channels(&settings)?;
    let mut server = RelayServer::new(ServerConfig::from(&settings), channels);
    if !cli.no_metrics {
        let handle =
            stul_server::metrics::install_recorder().context("failed to install metrics recorder")?;
        server = server.with_metrics(handle);
    }

    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    tracing::info!("stul-proxy listening on http://{addr}");

    shutdown_signal().await?;

    tracing::info!("shutting down");
    server.shutdown_gracefully(handle, None).await;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["stul-proxy"]);
        assert!(cli.config.is_none());
        assert!(cli.bind.is_none());
        assert!(cli.log_level.is_none());
        assert!(!cli.no_metrics);
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::parse_from([
            "stul-proxy",
            "--config",
            "/etc/stul.json",
            "--bind",
            "127.0.0.1:9000",
            "--log-level",
            "debug",
            "--no-metrics",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/stul.json")));
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.no_metrics);
    }

    #[test]
    fn bind_flag_beats_environment() {
        let cli = Cli::parse_from(["stul-proxy", "--bind", "127.0.0.1:1"]);
        let settings = resolve_settings(&cli, env_of(&[("BIND", "0.0.0.0:2")])).unwrap();
        assert_eq!(settings.bind, "127.0.0.1:1");
    }

    #[test]
    fn environment_used_without_flags() {
        let cli = Cli::parse_from(["stul-proxy"]);
        let env = env_of(&[("BIND", ":8080"), ("AUTH", "alpha:s3cret")]);
        let settings = resolve_settings(&cli, env).unwrap();
        assert_eq!(settings.bind, "0.0.0.0:8080");
        assert_eq!(settings.channels["alpha"], "s3cret");
    }

    #[test]
    fn config_file_and_auth_merge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"channels": {{"beta": "b"}}, "logging": {{"level": "warn"}}}}"#).unwrap();

        let cli = Cli::parse_from([
            "stul-proxy",
            "--config",
            file.path().to_str().unwrap(),
            "--log-level",
            "trace",
        ]);
        let settings = resolve_settings(&cli, env_of(&[("AUTH", "alpha:a")])).unwrap();
        assert_eq!(settings.channels.len(), 2);
        assert_eq!(settings.logging.level, "trace");
    }

    #[test]
    fn invalid_auth_is_an_error() {
        let cli = Cli::parse_from(["stul-proxy"]);
        assert!(resolve_settings(&cli, env_of(&[("AUTH", "nocolon")])).is_err());
    }

    #[test]
    fn no_channels_is_fatal() {
        let err = build_channels(&RelaySettings::default()).unwrap_err();
        assert!(err.to_string().contains("no channels configured"));
    }

    #[test]
    fn channels_built_from_settings() {
        let mut settings = RelaySettings::default();
        let _ = settings.channels.insert("alpha".into(), "s3cret".into());
        let table = build_channels(&settings).unwrap();
        assert!(table.authenticate("alpha", "s3cret"));
        assert_eq!(table.names(), vec!["alpha"]);
    }
}
