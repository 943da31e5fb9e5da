use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::layout::{AssignError, LayoutError};
use crate::services::seating::ServiceError;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Ошибка HTTP-слоя. Отдаётся клиенту как `{ "success": false, "error": ... }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Service(e.into())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        let AppError::Service(e) = self else {
            return StatusCode::BAD_REQUEST;
        };
        match e {
            ServiceError::EventNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Session(e) => match e {
                SessionError::Assign(AssignError::Conflict { .. })
                | SessionError::DuplicateGuest(_)
                | SessionError::VersionMismatch { .. }
                | SessionError::StaleRollback { .. } => StatusCode::CONFLICT,
                SessionError::Assign(AssignError::UnknownGuest(_))
                | SessionError::GuestNotFound(_)
                | SessionError::UnknownEntry(_) => StatusCode::NOT_FOUND,
            },
            ServiceError::Layout(LayoutError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Layout(_) | ServiceError::Transfer(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Storage(StorageError::CircuitOpen) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Storage(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let mut body = json!({ "success": false, "error": self.to_string() });
        // при конфликте места клиенту нужен занявший его гость
        if let AppError::Service(ServiceError::Session(SessionError::Assign(AssignError::Conflict {
            seat,
            occupant_id,
            occupant_name,
        }))) = &self
        {
            body["conflict"] = json!({
                "seat": seat,
                "occupantId": occupant_id,
                "occupantName": occupant_name,
            });
        }
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
