//! Bounded-wait reads of JSON values from an inbound frame stream.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use stul_settings::TimeoutMode;
use tokio::time::{Instant, timeout_at};
use tracing::trace;

use crate::error::ReadFailure;

/// Reads whole JSON values from a WebSocket stream.
///
/// Text frames carry JSON and a binary frame is a read failure. Ping and Pong
/// frames are skipped but still count as activity in [`TimeoutMode::Idle`].
pub struct FrameReader<S> {
    stream: S,
    mode: TimeoutMode,
    idle: Duration,
    lifetime_end: Instant,
}

impl<S, E> FrameReader<S>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    /// Wrap `stream`. In lifetime mode the cap starts now.
    pub fn new(stream: S, mode: TimeoutMode, wait: Duration) -> Self {
        Self {
            stream,
            mode,
            idle: wait,
            lifetime_end: Instant::now() + wait,
        }
    }

    /// Next value, bounded by the configured timeout mode.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<T, ReadFailure> {
        loop {
            let deadline = match self.mode {
                TimeoutMode::Idle => Instant::now() + self.idle,
                TimeoutMode::Lifetime => self.lifetime_end,
            };
            if let Some(value) = self.read_frame(deadline).await? {
                return Ok(value);
            }
        }
    }

    /// Next value, arriving no later than `deadline`. Control frames do not
    /// extend the wait.
    pub async fn recv_until<T: DeserializeOwned>(
        &mut self,
        deadline: Instant,
    ) -> Result<T, ReadFailure> {
        loop {
            if let Some(value) = self.read_frame(deadline).await? {
                return Ok(value);
            }
        }
    }

    /// One frame. `None` for control frames.
    async fn read_frame<T: DeserializeOwned>(
        &mut self,
        deadline: Instant,
    ) -> Result<Option<T>, ReadFailure> {
        let frame = timeout_at(deadline, self.stream.next())
            .await
            .map_err(|_| ReadFailure::TimedOut)?;

        match frame {
            None | Some(Ok(Message::Close(_))) => Err(ReadFailure::Closed),
            Some(Err(e)) => Err(ReadFailure::Transport(e.to_string())),
            Some(Ok(Message::Text(text))) => Ok(Some(serde_json::from_str(text.as_str())?)),
            Some(Ok(Message::Binary(_))) => Err(ReadFailure::BinaryFrame),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                trace!("control frame");
                Ok(None)
            }
        }
    }
}
