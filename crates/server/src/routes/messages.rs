use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use models::messages::{InboundMessage, InstallReason, MessageSender};

use super::AppState;
use crate::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct RuntimeMessage {
    pub message: Value,
    #[serde(default)]
    pub sender: MessageSender,
}

#[derive(Debug, Deserialize)]
pub struct InstalledEvent {
    pub reason: InstallReason,
}

/// A page script message. Replies with JSON, or 204 when the message gets no reply.
pub async fn runtime_message(
    State(state): State<AppState>,
    Json(body): Json<RuntimeMessage>,
) -> Result<Response, ApiError> {
    let msg: InboundMessage = match serde_json::from_value(body.message) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "ignoring unrecognized runtime message");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
    };
    match state.bg.router().handle(msg, body.sender).await? {
        Some(reply) => Ok(Json(reply).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn installed(
    State(state): State<AppState>,
    Json(event): Json<InstalledEvent>,
) -> Result<StatusCode, ApiError> {
    state.bg.router().on_installed(event.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn command(State(state): State<AppState>, Path(command): Path<String>) -> Result<StatusCode, ApiError> {
    state.bg.router().handle_command(&command).await?;
    Ok(StatusCode::NO_CONTENT)
}
