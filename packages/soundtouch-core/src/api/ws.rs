//! Push notification endpoint of the simulated speaker.
//!
//! Clients connect to the WebSocket port's root path. Each one receives a
//! `SoundTouchSdkInfo` greeting, then every `updates` frame the device
//! publishes until either side closes.

use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use tokio::sync::broadcast::error::RecvError;

use crate::api::AppState;
use crate::protocol_constants::{SDK_INFO_ELEMENT, WS_SUBPROTOCOL};

/// Creates the router for the WebSocket port.
pub fn create_router(state: AppState) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(state)
}

fn greeting() -> String {
    format!(
        r#"<{} serverVersion="4" serverBuild="{}" />"#,
        SDK_INFO_ELEMENT,
        env!("CARGO_PKG_VERSION")
    )
}

/// Upgrades the request, selecting the `gabbo` subprotocol when offered.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.protocols([WS_SUBPROTOCOL])
        .on_upgrade(move |socket| handle_ws(socket, peer, state))
}

async fn handle_ws(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.device.subscribe();

    let guard = state.clients.register(peer);
    let cancel_token = guard.cancel_token().clone();

    if sender.send(Message::Text(greeting().into())).await.is_err() {
        log::warn!("[WS] Client {} left before the greeting", guard.id());
        return;
    }

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Client {} force-closed", guard.id());
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            msg = receiver.next() => match msg {
                // Clients only ping; tungstenite answers those itself.
                Some(Ok(Message::Text(text))) => {
                    log::debug!("[WS] Client {} sent {} bytes, ignoring", guard.id(), text.as_str().len());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            update = updates.recv() => match update {
                Ok(frame) => {
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("[WS] Client {} lagged, skipped {} update(s)", guard.id(), skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{decode, DecodeError};

    #[test]
    fn greeting_is_not_an_updates_envelope() {
        match decode(greeting().as_bytes()) {
            Err(DecodeError::UnexpectedRoot(root)) => assert_eq!(root, SDK_INFO_ELEMENT),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
