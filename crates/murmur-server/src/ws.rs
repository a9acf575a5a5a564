//! Websocket transport for the live channel (`GET /ws?token=...`).
//!
//! The token is checked before the upgrade so a bad credential gets a plain
//! 401. After the upgrade a writer task drains the session's outbound queue
//! into the socket while the reader loop feeds inbound frames to the session.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::session::{AuthenticatedSession, Session};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Result<Response, ServerError> {
    let token = params
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ServerError::Unauthorized("missing token".into()))?;
    let pending = Session::authenticate(&state, &token).await?;

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, pending)))
}

async fn run_connection(socket: WebSocket, state: AppState, pending: AuthenticatedSession) {
    let (session, mut outbound) = pending.activate(&state).await;
    let (mut sink, mut stream) = socket.split();
    let connection = session.handle().id;

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(event = event.name(), error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_text(&text).await,
            Ok(Message::Binary(_)) => {
                session.report(&ServerError::Validation(
                    "binary frames are not supported".into(),
                ));
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                debug!(connection = %connection, error = %e, "Websocket read failed");
                break;
            }
        }
    }

    session.close().await;
    writer.abort();
}
