//! Realtime WebSocket link with bounded auto-reconnect.
//!
//! Connects to the relay's `/ws` endpoint and surfaces connection
//! lifecycle changes and parsed [`RealtimeMessage`]s through a
//! [`tokio::sync::mpsc`] channel. Reconnection uses a fixed delay and
//! gives up after a bounded number of consecutive failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use homewatch_api::websocket::{LinkEvent, ReconnectConfig, WebSocketHandle};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("ws://localhost:8000/ws")?;
//!
//! let (handle, mut events) = WebSocketHandle::connect(ws_url, ReconnectConfig::default(), cancel);
//!
//! while let Some(event) = events.recv().await {
//!     if let LinkEvent::Message(msg) = event {
//!         println!("{}", msg.channel());
//!     }
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::realtime::RealtimeMessage;

// ── Channel capacity ─────────────────────────────────────────────────

const LINK_CHANNEL_CAPACITY: usize = 256;

// ── LinkEvent ────────────────────────────────────────────────────────

/// Everything the background link reports to its owner.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A connection attempt is starting. `attempt` counts from 1 and
    /// resets after every successful connection.
    Connecting { attempt: u32 },
    Connected,
    /// An established session ended. A reconnect follows unless the
    /// link was cancelled.
    Disconnected,
    Message(Arc<RealtimeMessage>),
    /// Consecutive failures reached the configured limit; the link task
    /// has stopped.
    GaveUp,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Pause between connection attempts. Default: 1s.
    pub delay: Duration,

    /// Consecutive failed attempts tolerated before giving up.
    /// `None` means retry forever. Default: 10.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: Some(10),
        }
    }
}

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running realtime link.
///
/// Dropping the handle does not stop the background task; call
/// [`shutdown`](Self::shutdown) or cancel the token passed to
/// [`connect`](Self::connect).
#[derive(Debug, Clone)]
pub struct WebSocketHandle {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously; its progress
    /// arrives on the returned receiver as [`LinkEvent`]s. The task stops
    /// when the token is cancelled, the receiver is dropped, or the
    /// reconnect limit is reached.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (event_tx, event_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, event_tx, outbound_rx, reconnect, task_cancel).await;
        });

        (Self { outbound, cancel }, event_rx)
    }

    /// Queue a message for the current session.
    ///
    /// Returns `false` when the link task has already stopped. Messages
    /// queued while disconnected are discarded at the next connect.
    pub fn send(&self, message: &RealtimeMessage) -> Result<bool, Error> {
        let frame = message.to_frame().map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        Ok(self.outbound.send(frame).is_ok())
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled() || self.outbound.is_closed()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump → on failure, wait → reconnect.
async fn ws_loop(
    ws_url: Url,
    event_tx: mpsc::Sender<LinkEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        if event_tx
            .send(LinkEvent::Connecting {
                attempt: failures + 1,
            })
            .await
            .is_err()
        {
            break;
        }

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = open(&ws_url) => result,
        };

        match opened {
            Ok(stream) => {
                failures = 0;
                // Stale frames from a previous session are not replayed.
                while outbound.try_recv().is_ok() {}

                if event_tx.send(LinkEvent::Connected).await.is_err() {
                    break;
                }

                let result = pump(stream, &event_tx, &mut outbound, &cancel).await;
                if let Err(ref e) = result {
                    tracing::warn!(error = %e, "WebSocket session ended with error");
                }

                if cancel.is_cancelled() {
                    let _ = event_tx.send(LinkEvent::Disconnected).await;
                    break;
                }
                if event_tx.send(LinkEvent::Disconnected).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(error = %e, attempt = failures, "WebSocket connect failed");

                if let Some(max) = reconnect.max_attempts {
                    if failures >= max {
                        tracing::error!(
                            max_attempts = max,
                            "WebSocket reconnection limit reached, giving up"
                        );
                        let _ = event_tx.send(LinkEvent::GaveUp).await;
                        break;
                    }
                }
            }
        }

        tracing::info!(
            delay_ms = u64::try_from(reconnect.delay.as_millis()).unwrap_or(u64::MAX),
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(reconnect.delay) => {}
        }
    }

    outbound.close();
    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn open(url: &Url) -> Result<WsStream, Error> {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("WebSocket connected");
    Ok(ws_stream)
}

/// Read frames and write queued messages until the session drops.
async fn pump(
    ws_stream: WsStream,
    event_tx: &mpsc::Sender<LinkEvent>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            frame = outbound.recv(), if !outbound.is_closed() => {
                let Some(frame) = frame else {
                    continue;
                };
                write
                    .send(tungstenite::Message::text(frame))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(msg) = parse_frame(&text) {
                            if event_tx.send(LinkEvent::Message(Arc::new(msg))).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    // tungstenite answers pings on its own; binary frames are not part of the protocol
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse one text frame. Unknown channels and malformed JSON are skipped.
fn parse_frame(text: &str) -> Option<RealtimeMessage> {
    match RealtimeMessage::from_frame(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable realtime frame");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::realtime::CameraStatus;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay, Duration::from_secs(1));
        assert_eq!(config.max_attempts, Some(10));
    }

    #[test]
    fn parse_camera_status_frame() {
        let msg = parse_frame(
            r#"{"channel":"camera_status","payload":{"camera_id":"raspberry-01","status":"offline"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            RealtimeMessage::CameraStatus(CameraStatus {
                camera_id: "raspberry-01".into(),
                status: "offline".into(),
            })
        );
    }

    #[test]
    fn parse_malformed_frame_is_skipped() {
        assert!(parse_frame("not json at all").is_none());
        assert!(parse_frame(r#"{"channel":"nope"}"#).is_none());
    }

    #[tokio::test]
    async fn unreachable_server_gives_up_after_limit() {
        // Port 9 on loopback is closed; every attempt fails fast.
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let config = ReconnectConfig {
            delay: Duration::from_millis(5),
            max_attempts: Some(3),
        };
        let (handle, mut events) = WebSocketHandle::connect(url, config, CancellationToken::new());

        let mut attempts = Vec::new();
        let mut gave_up = false;
        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::Connecting { attempt } => attempts.push(attempt),
                LinkEvent::GaveUp => gave_up = true,
                other => panic!("unexpected link event: {other:?}"),
            }
        }

        assert!(gave_up);
        assert_eq!(attempts, vec![1, 2, 3]);
        assert!(handle.is_shut_down());
    }
}
