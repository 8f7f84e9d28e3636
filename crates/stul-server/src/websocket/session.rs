//! Session lifecycle for one host or client connection, from upgrade
//! through teardown.
//!
//! `Accepted → Authenticating (host only) → Registered → Relaying → Closed`

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes};
use futures::{Sink, Stream};
use metrics::{counter, gauge};
use serde_json::Value;
use stul_core::{AUTH_FAILED_NOTICE, AuthRequest, ConnectionId, Envelope, Role};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, warn};

use super::broadcast::broadcast;
use super::connection::ConnectionHandle;
use super::reader::FrameReader;
use crate::channel::Channel;
use crate::config::SessionConfig;
use crate::error::{AuthFailure, ReadFailure, SessionError};
use crate::metrics::{AUTH_FAILURES_TOTAL, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, MESSAGES_RELAYED_TOTAL};

/// How a registered session ended.
#[derive(Debug)]
pub struct SessionEnd {
    /// Id the connection was registered under.
    pub id: ConnectionId,
    /// Values received and broadcast.
    pub relayed: u64,
    /// Outbound frames dropped because the connection's queue was full.
    pub dropped: u64,
    /// What ended the relay loop.
    pub reason: ReadFailure,
}

/// Run one connection to completion.
///
/// Hosts must authenticate with their first message before the auth wait
/// expires; on failure they get [`AUTH_FAILED_NOTICE`] and are closed without
/// ever being registered. Registered connections have every received value
/// wrapped for their role and broadcast to the opposite role. The loop ends
/// on the first read failure, writer failure or `shutdown`, after which the
/// connection is deregistered and, for hosts, presence is re-broadcast.
#[instrument(
    skip_all,
    fields(channel = %channel.name(), role = %role, conn_id = tracing::field::Empty)
)]
pub async fn run_session<Si, St, E>(
    sink: Si,
    stream: St,
    channel: Arc<Channel>,
    role: Role,
    config: SessionConfig,
    shutdown: CancellationToken,
) -> Result<SessionEnd, SessionError>
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (handle, writer) = ConnectionHandle::spawn(role, sink, &config);
    let mut reader = FrameReader::new(stream, config.timeout_mode, config.idle_timeout);

    if role == Role::Host {
        let deadline = Instant::now() + config.auth_timeout;
        if let Err(failure) = authenticate(&mut reader, &channel, deadline, &shutdown).await {
            counter!(AUTH_FAILURES_TOTAL).increment(1);
            warn!(error = %failure, "host authentication failed");
            if let Err(e) = handle.send_frame(Utf8Bytes::from_static(AUTH_FAILED_NOTICE)) {
                debug!(error = %e, "auth failure notice not queued");
            }
            finish(&handle, writer, config.write_timeout).await;
            return Err(failure.into());
        }
    }

    let registry = channel.registry(role);
    let id = registry.register(Arc::clone(&handle));
    let _ = Span::current().record("conn_id", id.get());
    counter!(CONNECTIONS_TOTAL, "role" => role.as_str()).increment(1);
    gauge!(CONNECTIONS_ACTIVE, "role" => role.as_str()).increment(1.0);
    info!("connection registered");

    match role {
        Role::Client => {
            let status = Envelope::host_status(channel.host_connected());
            if let Err(e) = handle.send(&status) {
                debug!(error = %e, "presence snapshot not queued");
            }
        }
        Role::Host => {
            let _ = broadcast(channel.clients(), &Envelope::host_status(true));
        }
    }

    let peers = channel.registry(role.opposite());
    let mut relayed: u64 = 0;
    let reason = loop {
        let value: Value = tokio::select! {
            biased;
            () = shutdown.cancelled() => break ReadFailure::Shutdown,
            () = handle.closed() => break ReadFailure::WriterFailed,
            res = reader.recv() => match res {
                Ok(value) => value,
                Err(e) => break e,
            },
        };
        let _ = broadcast(peers, &role.wrap(value));
        relayed += 1;
        counter!(MESSAGES_RELAYED_TOTAL, "role" => role.as_str()).increment(1);
    };

    let _ = registry.deregister(id);
    gauge!(CONNECTIONS_ACTIVE, "role" => role.as_str()).decrement(1.0);
    if role == Role::Host {
        let _ = broadcast(channel.clients(), &Envelope::host_status(channel.host_connected()));
    }
    let dropped = handle.drop_count();
    info!(
        relayed,
        dropped,
        age_ms = handle.age().as_millis(),
        reason = %reason,
        "connection closed"
    );

    finish(&handle, writer, config.write_timeout).await;
    Ok(SessionEnd {
        id,
        relayed,
        dropped,
        reason,
    })
}

async fn authenticate<St, E>(
    reader: &mut FrameReader<St>,
    channel: &Channel,
    deadline: Instant,
    shutdown: &CancellationToken,
) -> Result<(), AuthFailure>
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let request: AuthRequest = tokio::select! {
        biased;
        () = shutdown.cancelled() => return Err(AuthFailure::NoRequest(ReadFailure::Shutdown)),
        res = reader.recv_until(deadline) => res.map_err(AuthFailure::NoRequest)?,
    };
    if channel.authenticate(&request.password) {
        Ok(())
    } else {
        Err(AuthFailure::WrongPassword)
    }
}

/// Close the handle and give the writer a bounded chance to flush.
async fn finish(handle: &ConnectionHandle, mut writer: JoinHandle<()>, write_timeout: Duration) {
    handle.close();
    if timeout(write_timeout.saturating_mul(2), &mut writer).await.is_err() {
        debug!("writer did not finish, aborting");
        writer.abort();
    }
}
