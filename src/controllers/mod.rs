pub mod events;
pub mod guests;
pub mod layout;
#[cfg(feature = "analytics")]
pub mod analytics;

use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    let router = Router::new()
        .merge(events::routes())
        .merge(guests::routes())
        .merge(layout::routes());

    #[cfg(feature = "analytics")]
    let router = router.merge(analytics::routes());

    router
}

/// Успешный ответ: `{ "success": true, ...body }`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Serialize)]
pub struct Data<T> {
    data: T,
}

pub(crate) fn success<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success { success: true, body })
}

pub(crate) fn data<T: Serialize>(data: T) -> Json<Success<Data<T>>> {
    success(Data { data })
}
