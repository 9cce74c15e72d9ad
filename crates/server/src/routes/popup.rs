use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use models::{AllConfigs, GamepadConfig, GlobalPrefs, PaymentRecord, TrialState};
use service::actions::GameStatus;
use service::payment::PaymentPage;

use super::AppState;
use crate::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateConfig {
    pub name: String,
    #[serde(default)]
    pub config: Option<GamepadConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub async fn list_configs(State(state): State<AppState>) -> Result<Json<AllConfigs>, ApiError> {
    Ok(Json(state.bg.actions().fetch_all().await?))
}

pub async fn create_config(
    State(state): State<AppState>,
    Json(input): Json<CreateConfig>,
) -> Result<(StatusCode, Json<GamepadConfig>), ApiError> {
    let config = state.bg.actions().create(&input.name, input.config).await?;
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn modify_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(config): Json<GamepadConfig>,
) -> Result<StatusCode, ApiError> {
    state.bg.actions().modify(&name, config).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_config(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    state.bg.actions().delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate_config(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    state.bg.actions().activate(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disable(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.bg.actions().disable().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_prefs(
    State(state): State<AppState>,
    Json(prefs): Json<GlobalPrefs>,
) -> Result<StatusCode, ApiError> {
    state.bg.actions().update_prefs(prefs).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn payment(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<PaymentRecord>, ApiError> {
    Ok(Json(state.bg.actions().fetch_payment(query.refresh).await?))
}

pub async fn trial(State(state): State<AppState>) -> Result<Json<TrialState>, ApiError> {
    Ok(Json(state.bg.actions().trial_state().await?))
}

pub async fn game_status(State(state): State<AppState>) -> Result<Json<GameStatus>, ApiError> {
    Ok(Json(state.bg.actions().game_status().await?))
}

pub async fn open_payment_page(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let page = PaymentPage::parse(&page).ok_or_else(|| ApiError::not_found(format!("unknown payment page {page:?}")))?;
    let url = state.bg.actions().open_payment_page(page);
    Ok(Json(json!({"url": url})))
}
