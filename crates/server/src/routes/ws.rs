use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use super::AppState;
use crate::bridge::{Channel, WsBridge};
use crate::errors::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub channel: String,
    #[serde(default)]
    pub tab_id: Option<u32>,
}

impl ConnectQuery {
    fn channel(&self) -> Option<Channel> {
        match self.channel.as_str() {
            "page" => Some(Channel::Page { tab_id: self.tab_id }),
            "popup" => Some(Channel::Popup),
            _ => None,
        }
    }
}

/// Upgrade to a WebSocket that receives outbound messages for the requested channel.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let channel = query
        .channel()
        .ok_or_else(|| ApiError::bad_request(format!("unknown channel {:?}", query.channel)))?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, channel, state.bridge)).into_response())
}

async fn handle_socket(socket: WebSocket, channel: Channel, bridge: Arc<WsBridge>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, ?channel, "bridge client connected");

    let mut rx = bridge.add(conn_id.clone(), channel);
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "bridge sink closed");
                break;
            }
        }
    });

    // Inbound traffic arrives over HTTP; the socket only watches for the close.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "bridge receive error");
                break;
            }
        }
    }

    bridge.remove(&conn_id);
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "bridge client disconnected");
}
