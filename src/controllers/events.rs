use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{data, success};
use crate::error::AppResult;
use crate::models::{EventPatch, NewEvent};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{event_id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/events/{event_id}/reload", post(reload_event))
        .route("/events/{event_id}/commands", get(list_commands))
        .route("/events/{event_id}/commands/{entry_id}/rollback", post(rollback_command))
}

async fn list_events(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(data(state.seating.list_events().await?))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewEvent>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let event = state.seating.create_event(req).await?;
    Ok((StatusCode::CREATED, data(event)))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(data(state.seating.get_event(&event_id).await?))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(patch): Json<EventPatch>,
) -> AppResult<impl IntoResponse> {
    patch.validate()?;
    let event = state.seating.update_event(&event_id, patch).await?;
    Ok(data(event))
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.seating.delete_event(&event_id).await?;
    Ok(data(event_id))
}

/// POST /api/events/{event_id}/reload
///
/// Сбрасывает сессию и перечитывает гостей из хранилища (например, после правки таблицы вручную).
async fn reload_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let guests = state.seating.reload(&event_id).await?;
    info!(event = %event_id, guests, "Event reloaded from storage");
    Ok(data(serde_json::json!({ "guests": guests })))
}

async fn list_commands(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(data(state.seating.commands(&event_id).await?))
}

async fn rollback_command(
    State(state): State<Arc<AppState>>,
    Path((event_id, entry_id)): Path<(String, u64)>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.seating.rollback(&event_id, entry_id).await?;
    Ok(success(outcome))
}
