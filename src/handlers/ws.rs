//! Push channel (§6): a persistent WebSocket connection. Clients send
//! `{type: "subscribe_auction", auction_id}` / `{type:
//! "unsubscribe_auction", auction_id}` control frames and receive the
//! events enumerated in §4.9, tagged with their event name. The transport
//! itself is out of scope for the core (§1); only the event/payload
//! contract is. Every connection also gets the global topic for free.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlFrame {
    SubscribeAuction { auction_id: Uuid },
    UnsubscribeAuction { auction_id: Uuid },
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let mut subscriptions: HashMap<Uuid, tokio::task::JoinHandle<()>> = HashMap::new();

    let global_task = spawn_forwarder(state.events.subscribe_global(), out_tx.clone());

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ControlFrame>(&text) {
                            Ok(ControlFrame::SubscribeAuction { auction_id }) => {
                                subscriptions.entry(auction_id).or_insert_with(|| {
                                    spawn_forwarder(
                                        state.events.subscribe_auction(auction_id),
                                        out_tx.clone(),
                                    )
                                });
                            }
                            Ok(ControlFrame::UnsubscribeAuction { auction_id }) => {
                                if let Some(handle) = subscriptions.remove(&auction_id) {
                                    handle.abort();
                                }
                            }
                            Err(err) => debug!(%err, "ignoring malformed control frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(%err, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
            Some(text) = out_rx.recv() => {
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    }

    global_task.abort();
    for (_, handle) in subscriptions {
        handle.abort();
    }
}

fn spawn_forwarder(
    mut rx: tokio::sync::broadcast::Receiver<crate::models::AuctionEvent>,
    out_tx: mpsc::UnboundedSender<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(text) => {
                        if out_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Err(err) => debug!(%err, "failed to serialize event"),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

