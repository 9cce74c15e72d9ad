use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;
use service::Background;

use crate::bridge::WsBridge;

pub mod messages;
pub mod popup;
pub mod ws;

/// Shared handler state: the background context and the socket fan-out it sends through.
#[derive(Clone)]
pub struct AppState {
    pub bg: Background,
    pub bridge: Arc<WsBridge>,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

/// Build the full application router: runtime messaging, popup API and the socket endpoint.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let runtime = Router::new()
        .route("/runtime/message", post(messages::runtime_message))
        .route("/runtime/installed", post(messages::installed))
        .route("/commands/:command", post(messages::command))
        .route("/ws", get(ws::ws_handler));

    let api = Router::new()
        .route("/api/configs", get(popup::list_configs).post(popup::create_config))
        .route("/api/configs/:name", put(popup::modify_config).delete(popup::delete_config))
        .route("/api/configs/:name/activate", post(popup::activate_config))
        .route("/api/disable", post(popup::disable))
        .route("/api/prefs", put(popup::update_prefs))
        .route("/api/payment", get(popup::payment))
        .route("/api/payment/pages/:page", post(popup::open_payment_page))
        .route("/api/trial", get(popup::trial))
        .route("/api/game", get(popup::game_status));

    Router::new()
        .route("/health", get(health))
        .merge(runtime)
        .merge(api)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
