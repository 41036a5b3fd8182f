use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::{encoder::EncodeError, session::SessionError, view::TransitionError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found")] SessionNotFound,
    #[error("no suggestion is selected")] NothingSelected,
    #[error("bad request: {0}")] BadRequest(String),
    #[error(transparent)] Transition(#[from] TransitionError),
    #[error(transparent)] Encode(#[from] EncodeError),
    #[error("session worker has stopped")] SessionClosed,
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Transition(t) => ApiError::Transition(t),
            SessionError::Closed => ApiError::SessionClosed,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::Transition(TransitionError::UnknownSuggestion(_)) => StatusCode::NOT_FOUND,
            ApiError::Transition(_) | ApiError::NothingSelected => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Encode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SessionClosed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
