//! Duplex push channel over WebSocket.
//!
//! The server uses this persistent connection to announce remote changes
//! without waiting for the client's next pull. The client keeps the
//! connection alive with periodic pings and answers server pings.

use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, SyncEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use syncline_protocol::ChannelMessage;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;

/// Configuration for a duplex push channel connection.
#[derive(Debug, Clone)]
pub struct PushChannel {
    url: String,
    ping_interval: Duration,
}

impl PushChannel {
    /// Creates a channel configuration for the given WebSocket URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ping_interval: Duration::from_secs(30),
        }
    }

    /// Sets the liveness ping interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Connects and spawns the receive loop.
    ///
    /// Server `sync_update` frames are surfaced as
    /// [`SyncEvent::RemoteNotification`] on the bus; connection failures
    /// as [`SyncEvent::Error`]. The loop runs until the server closes or
    /// [`PushChannelHandle::close`] is called.
    pub async fn connect(self, events: Arc<EventBus>) -> EngineResult<PushChannelHandle> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| EngineError::network_retryable(format!("channel connect failed: {e}")))?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let ping_interval = self.ping_interval;

        let task = tokio::spawn(async move {
            let (mut sink, mut stream) = ws.split();
            let mut ping = tokio::time::interval(ping_interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    _ = ping.tick() => {
                        let frame = match serde_json::to_string(&ChannelMessage::Ping) {
                            Ok(frame) => frame,
                            Err(_) => continue,
                        };
                        if sink.send(Message::Text(frame)).await.is_err() {
                            events.emit(&SyncEvent::Error {
                                message: "push channel write failed".into(),
                            });
                            break;
                        }
                    }
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let Some(message) = decode_frame(&text) else {
                                tracing::debug!(frame = %text, "ignoring unrecognized channel frame");
                                continue;
                            };

                            if let ChannelMessage::SyncUpdate { payload } = &message {
                                events.emit(&SyncEvent::RemoteNotification {
                                    payload: payload.clone(),
                                });
                            }

                            if let Some(reply) = reply_for(&message) {
                                if let Ok(frame) = serde_json::to_string(&reply) {
                                    let _ = sink.send(Message::Text(frame)).await;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("push channel closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            events.emit(&SyncEvent::Error {
                                message: format!("push channel error: {e}"),
                            });
                            break;
                        }
                    }
                }
            }
        });

        Ok(PushChannelHandle { shutdown_tx, task })
    }
}

/// Handle to a running push channel.
pub struct PushChannelHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl PushChannelHandle {
    /// Asks the loop to close the connection and waits for it to finish.
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }

    /// Returns true when the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Parses a text frame; `None` for frames the client does not understand.
fn decode_frame(text: &str) -> Option<ChannelMessage> {
    serde_json::from_str(text).ok()
}

/// The frame to send back for an incoming message, if any.
fn reply_for(message: &ChannelMessage) -> Option<ChannelMessage> {
    match message {
        ChannelMessage::Ping => Some(ChannelMessage::Pong),
        ChannelMessage::SyncUpdate { .. } | ChannelMessage::Pong => None,
    }
}
