//! Connection handle and its outbound writer task.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, close_code};
use futures::{Sink, SinkExt};
use stul_core::{Envelope, Role};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{MIN_PING_INTERVAL, SessionConfig};
use crate::error::SendError;

/// One live connection, as seen by registries and broadcasts.
///
/// Sending never touches the transport directly: frames are queued and a
/// dedicated writer task drains the queue, so a slow peer only fills its own
/// queue. Cancelling the handle stops the writer after it has flushed what
/// was already queued.
pub struct ConnectionHandle {
    role: Role,
    tx: mpsc::Sender<Utf8Bytes>,
    cancel: CancellationToken,
    dropped: AtomicU64,
    connected_at: Instant,
}

impl ConnectionHandle {
    /// Create a handle over an existing queue.
    pub fn new(role: Role, tx: mpsc::Sender<Utf8Bytes>) -> Self {
        Self {
            role,
            tx,
            cancel: CancellationToken::new(),
            dropped: AtomicU64::new(0),
            connected_at: Instant::now(),
        }
    }

    /// Create a handle and spawn the writer task that owns `sink`.
    pub fn spawn<S>(role: Role, sink: S, config: &SessionConfig) -> (Arc<Self>, JoinHandle<()>)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display,
    {
        let (tx, rx) = mpsc::channel(config.send_queue_capacity.max(1));
        let handle = Arc::new(Self::new(role, tx));
        let writer = tokio::spawn(write_loop(
            sink,
            rx,
            handle.cancel.clone(),
            config.ping_interval.max(MIN_PING_INTERVAL),
            config.write_timeout,
        ));
        (handle, writer)
    }

    /// Role of the connection.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Serialize and queue one envelope.
    pub fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        let json = serde_json::to_string(envelope)?;
        self.send_frame(Utf8Bytes::from(json))
    }

    /// Queue an already serialized text frame.
    pub fn send_frame(&self, frame: Utf8Bytes) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Cancelled);
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SendError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Stop accepting frames and let the writer flush and close.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the handle was closed or its writer failed.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the handle is closed or its writer failed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Frames dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Time since the handle was created.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Drain queued frames into `sink`, pinging on an interval.
///
/// A failed or timed out write cancels the token so the owning session sees
/// the connection as dead. On exit a normal Close frame is attempted.
async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Utf8Bytes>,
    cancel: CancellationToken,
    ping_interval: Duration,
    write_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(text) => Message::Text(text),
                None => break,
            },
            () = cancel.cancelled() => break,
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "write failed");
                cancel.cancel();
                return;
            }
            Err(_) => {
                debug!(timeout_ms = write_timeout.as_millis(), "write timed out");
                cancel.cancel();
                return;
            }
        }
    }

    cancel.cancel();
    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static(""),
    }));
    if let Ok(Err(e)) = timeout(write_timeout, sink.send(close)).await {
        debug!(error = %e, "close frame not sent");
    }
    let _ = timeout(write_timeout, sink.close()).await;
}
