// Shared HTTP response types for consistent API error payloads.

use crate::domain::EngineError;
use crate::use_cases::RoomError;
use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    // Human-readable error string for consistent JSON error responses.
    pub error: String,
}

pub fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

pub fn room_error_status(err: &RoomError) -> StatusCode {
    match err {
        RoomError::NotFound => StatusCode::NOT_FOUND,
        RoomError::AlreadyExists => StatusCode::CONFLICT,
        RoomError::NotHost => StatusCode::FORBIDDEN,
        RoomError::Closed => StatusCode::GONE,
        RoomError::Engine(EngineError::InvalidDimensions { .. } | EngineError::NoEmptyTile) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        RoomError::Engine(EngineError::UnknownPlayer(_) | EngineError::InvalidWinner(_)) => {
            StatusCode::BAD_REQUEST
        }
        RoomError::Engine(_) => StatusCode::CONFLICT,
    }
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        error_response(room_error_status(&self), self.to_string())
    }
}
