//! guests.rs
//!
//! Гости мероприятия: список с поиском, правка, назначение мест, статусы,
//! массовое добавление и обмен списком в CSV.
//!
//! Все изменяющие запросы возвращают `entryId` (для отката) и `persisted`:
//! `false` означает, что изменение применено, но в хранилище не записано.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::{data, success};
use crate::error::{AppError, AppResult};
use crate::models::{GuestPatch, GuestStatus, NewGuest};
use crate::search::GuestFilter;
use crate::spreadsheet;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{event_id}/guests", get(list_guests).post(add_guest))
        .route("/events/{event_id}/guests/bulk", post(add_guests))
        .route("/events/{event_id}/guests/import", post(import_guests))
        .route("/events/{event_id}/guests/export", get(export_guests))
        .route(
            "/events/{event_id}/guests/{guest_id}",
            get(get_guest).patch(update_guest).delete(delete_guest),
        )
        .route("/events/{event_id}/guests/{guest_id}/seat", patch(assign_seat))
        .route("/events/{event_id}/guests/{guest_id}/status", patch(update_status))
        .route("/guests/template", get(template))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestsQuery {
    query: Option<String>,
    #[serde(default)]
    filter: GuestFilter,
    /// Только гости без места и отменившие участие (кандидаты на рассадку).
    #[serde(default)]
    available: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateGuestRequest {
    #[serde(flatten)]
    patch: GuestPatch,
    expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignSeatRequest {
    /// `null` или пустая строка снимает место.
    seat_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    status: GuestStatus,
    #[serde(default)]
    free_seat: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct BulkRequest {
    #[validate(length(min = 1, max = 5000), nested)]
    guests: Vec<NewGuest>,
    #[serde(default)]
    apply_layout: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportQuery {
    #[serde(default)]
    apply_layout: bool,
}

async fn list_guests(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Query(params): Query<GuestsQuery>,
) -> AppResult<impl IntoResponse> {
    let guests = state
        .seating
        .list_guests(&event_id, params.query.as_deref(), params.filter, params.available)
        .await?;
    Ok(data(guests))
}

async fn get_guest(
    State(state): State<Arc<AppState>>,
    Path((event_id, guest_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    Ok(data(state.seating.get_guest(&event_id, &guest_id).await?))
}

async fn add_guest(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<NewGuest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let outcome = state.seating.add_guest(&event_id, req).await?;
    Ok((StatusCode::CREATED, success(outcome)))
}

async fn update_guest(
    State(state): State<Arc<AppState>>,
    Path((event_id, guest_id)): Path<(String, String)>,
    Json(req): Json<UpdateGuestRequest>,
) -> AppResult<impl IntoResponse> {
    req.patch.validate()?;
    let outcome = state
        .seating
        .update_guest(&event_id, &guest_id, req.patch, req.expected_version)
        .await?;
    Ok(success(outcome))
}

/// PATCH /api/events/{event_id}/guests/{guest_id}/seat
///
/// Занятое другим гостем место - 409 с именем занявшего.
async fn assign_seat(
    State(state): State<Arc<AppState>>,
    Path((event_id, guest_id)): Path<(String, String)>,
    Json(req): Json<AssignSeatRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .seating
        .assign_seat(&event_id, &guest_id, req.seat_number.as_deref())
        .await?;
    Ok(success(outcome))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path((event_id, guest_id)): Path<(String, String)>,
    Json(req): Json<StatusRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .seating
        .update_status(&event_id, &guest_id, req.status, req.free_seat)
        .await?;
    Ok(success(outcome))
}

async fn delete_guest(
    State(state): State<Arc<AppState>>,
    Path((event_id, guest_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.seating.delete_guest(&event_id, &guest_id).await?;
    Ok(success(outcome))
}

async fn add_guests(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<BulkRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let outcome = state
        .seating
        .add_guests(&event_id, req.guests, req.apply_layout)
        .await?;
    Ok((StatusCode::CREATED, success(outcome)))
}

/// POST /api/events/{event_id}/guests/import?applyLayout=true
///
/// Тело запроса - CSV в формате шаблона.
async fn import_guests(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Query(params): Query<ImportQuery>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if body.is_empty() {
        return Err(AppError::BadRequest("guest list file is empty".to_string()));
    }
    let outcome = state
        .seating
        .import_csv(&event_id, &body, params.apply_layout)
        .await?;
    Ok((StatusCode::CREATED, success(outcome)))
}

fn csv_response(body: Vec<u8>, filename: &str) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
}

async fn export_guests(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let body = state.seating.export_csv(&event_id).await?;
    Ok(csv_response(body, &format!("guests-{event_id}.csv")))
}

async fn template() -> AppResult<impl IntoResponse> {
    let body = spreadsheet::template().map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(csv_response(body, "guest-template.csv"))
}
