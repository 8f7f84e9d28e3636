//! `RelayServer`: axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use stul_core::Role;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::channel::ChannelTable;
use crate::config::{ServerConfig, SessionConfig};
use crate::error::SessionError;
use crate::health::{self, HEALTH_OK, StatusReport};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_session;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Configured channels.
    pub channels: Arc<ChannelTable>,
    /// Parameters handed to each session.
    pub session: SessionConfig,
    /// Stop signal and live session tracking.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    channels: Arc<ChannelTable>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server over a fixed channel table.
    pub fn new(config: ServerConfig, channels: ChannelTable) -> Self {
        Self {
            config,
            channels: Arc::new(channels),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            channels: Arc::clone(&self.channels),
            session: self.config.session.clone(),
            shutdown: Arc::clone(&self.shutdown),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/client/{channel}", get(client_ws))
            .route("/host/{channel}", get(host_ws))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind.as_str()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, channels = self.channels.len(), "relay listening");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Cancel every session and the listener, then wait up to `timeout`
    /// for them to finish.
    pub async fn shutdown_gracefully(&self, server: JoinHandle<()>, timeout: Option<Duration>) {
        let outcome = self.shutdown.drain(server, timeout).await;
        info!(
            remaining = outcome.remaining_sessions,
            completed = outcome.completed,
            "relay stopped"
        );
    }

    /// Configured channels.
    pub fn channels(&self) -> &Arc<ChannelTable> {
        &self.channels
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /client/{channel}
async fn client_ws(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    upgrade(state, channel, Role::Client, ws)
}

/// GET /host/{channel}
async fn host_ws(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    upgrade(state, channel, Role::Host, ws)
}

/// Resolve the channel before looking at the upgrade, so unknown channels
/// are always 404 and never touch a registry.
fn upgrade(
    state: AppState,
    name: String,
    role: Role,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(channel) = state.channels.lookup(&name) else {
        debug!(channel = %name, %role, "unknown channel");
        return SessionError::ChannelNotFound(name).into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let config = state.session;
    let shutdown = state.shutdown.token();
    let coordinator = state.shutdown;
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| {
            coordinator.track_session(async move {
                let (sink, stream) = socket.split();
                if let Err(e) = run_session(sink, stream, channel, role, config, shutdown).await {
                    debug!(error = %e, "session rejected");
                }
            })
        })
}

/// GET /health
async fn health_handler() -> &'static str {
    HEALTH_OK
}

/// GET /status
async fn status_handler(State(state): State<AppState>) -> Json<StatusReport> {
    Json(health::status_report(state.start_time, &state.channels))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
