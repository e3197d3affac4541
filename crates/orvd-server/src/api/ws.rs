//! WebSocket bridge onto the topic broker.
//!
//! Clients send `{"op":"subscribe","pattern":"ping/{id}"}` or
//! `{"op":"publish","topic":"api/telemetry/V1","payload":"lat=..."}` and receive
//! every matching [`Publication`] as a JSON text frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::pubsub::{PubSub, Publication, Subscription};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ClientFrame {
    Subscribe { pattern: String },
    Publish { topic: String, payload: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn next_publication(subscription: &mut Option<Subscription>) -> Option<Publication> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

fn error_frame(message: impl std::fmt::Display) -> Message {
    Message::Text(serde_json::json!({ "error": message.to_string() }).to_string())
}

/// Apply one client frame. Returns a frame to send back on failure.
fn handle_frame(
    state: &AppState,
    subscription: &mut Option<Subscription>,
    text: &str,
) -> Option<Message> {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => return Some(error_frame(format!("bad frame: {}", e))),
    };
    match frame {
        ClientFrame::Subscribe { pattern } => {
            let result = if let Some(sub) = subscription.as_mut() {
                sub.add(&pattern)
            } else {
                state
                    .broker
                    .subscribe(&pattern)
                    .map(|sub| *subscription = Some(sub))
            };
            match result {
                Ok(()) => {
                    tracing::debug!("WebSocket subscribed to {}", pattern);
                    None
                }
                Err(e) => Some(error_frame(e)),
            }
        }
        ClientFrame::Publish { topic, payload } => {
            state.broker.publish(&topic, payload);
            None
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription: Option<Subscription> = None;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(&state, &mut subscription, &text) {
                            if socket.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            publication = next_publication(&mut subscription) => {
                let Some(publication) = publication else {
                    break;
                };
                let Ok(text) = serde_json::to_string(&publication) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    }
}
