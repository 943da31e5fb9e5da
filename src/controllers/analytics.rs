//! analytics.rs
//!
//! Статистика по рассадке мероприятия.
//!
//! Считается только по гостям с назначенным местом:
//! - сколько гостей рассажено и сколько из них прибыло;
//! - сколько среди рассаженных VIP и сколько VIP уже прибыло.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;

use super::data;
use crate::error::AppResult;
use crate::AppState;

/// Определяет маршруты, связанные со статистикой.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events/{event_id}/stats", get(get_event_stats))
}

/// GET /api/events/{event_id}/stats
async fn get_event_stats(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(data(state.seating.stats(&event_id).await?))
}
