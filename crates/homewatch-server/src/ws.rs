// ── Realtime WebSocket endpoint ──
//
// One task per connection. Each holds its own broadcast receiver; a client
// that falls behind skips what it missed and keeps going.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

use homewatch_api::RealtimeMessage;

use crate::AppState;

/// `GET /ws`
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the upgrade completes so nothing published after
    // the handshake is missed.
    let updates = state.relay.subscribe();
    ws.on_upgrade(move |socket| session(socket, updates, state))
}

async fn session(socket: WebSocket, mut updates: Receiver<Arc<RealtimeMessage>>, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(clients = state.relay.subscriber_count(), "realtime client connected");

    loop {
        tokio::select! {
            biased;
            () = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            update = updates.recv() => match update {
                Ok(message) => {
                    if forward(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "realtime client lagged, messages dropped");
                }
                Err(RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if matches!(RealtimeMessage::from_frame(text.as_str()), Ok(RealtimeMessage::Ping))
                        && forward(&mut sender, &RealtimeMessage::Pong).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "realtime client read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    // Our own receiver is still alive here, hence the minus one.
    tracing::info!(
        clients = state.relay.subscriber_count().saturating_sub(1),
        "realtime client disconnected"
    );
}

async fn forward(sender: &mut SplitSink<WebSocket, Message>, message: &RealtimeMessage) -> Result<(), axum::Error> {
    let frame = match message.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(channel = %message.channel(), error = %e, "could not encode realtime message");
            return Ok(());
        }
    };
    sender.send(Message::Text(frame.into())).await
}
