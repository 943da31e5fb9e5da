use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

use super::{data, success, Data, Success};
use crate::error::AppResult;
use crate::layout::GridLayout;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/events/{event_id}/layout",
            get(get_layout).put(import_layout).delete(clear_layout),
        )
        .route("/events/{event_id}/layout/manual", post(manual_layout))
        .route("/events/{event_id}/layout/summary", get(layout_summary))
}

#[derive(Debug, Deserialize, Validate)]
struct ManualLayoutRequest {
    #[validate(range(min = 1, max = 702))]
    rows: usize,
    #[validate(range(min = 1, max = 1000))]
    cols: u32,
}

fn json_response(body: String, cache: &'static str) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json"), (header::HeaderName::from_static("x-cache"), cache)],
        Body::from(body),
    )
        .into_response()
}

/// GET /api/events/{event_id}/layout
///
/// Материализованная сетка. Ответ кешируется в Redis под версией состояния
/// мероприятия, так что любое изменение даёт новый ключ.
async fn get_layout(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<Response> {
    if state.cache.is_enabled() {
        let version = state.seating.layout_version(&event_id).await?;
        if let Some(cached) = state.cache.get_layout(&event_id, &version).await {
            return Ok(json_response(cached, "HIT"));
        }
    }

    let (version, view) = state.seating.versioned_layout(&event_id).await?;
    let body: Success<Data<_>> = data(view).0;
    match serde_json::to_string(&body) {
        Ok(json) => {
            state.cache.save_layout(&event_id, &version, &json).await;
            Ok(json_response(json, "MISS"))
        }
        Err(e) => {
            warn!(event = %event_id, error = %e, "Cannot serialize layout for cache");
            Ok(Json(body).into_response())
        }
    }
}

/// PUT /api/events/{event_id}/layout
///
/// Явная схема `{ rows, cols, rowLabels }`; вывод схемы из мест отключается.
async fn import_layout(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(layout): Json<GridLayout>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.seating.import_layout(&event_id, layout).await?;
    Ok(success(outcome))
}

async fn manual_layout(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<ManualLayoutRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let outcome = state
        .seating
        .manual_layout(&event_id, req.rows, req.cols)
        .await?;
    Ok(success(outcome))
}

/// DELETE /api/events/{event_id}/layout - назад к выводу схемы из номеров мест.
async fn clear_layout(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.seating.set_layout(&event_id, None).await?;
    Ok(success(outcome))
}

async fn layout_summary(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(data(state.seating.layout_summary(&event_id).await?))
}
