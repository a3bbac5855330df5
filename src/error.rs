use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::economy::TradeError;
use crate::game::GameError;
use crate::persistence::PersistenceError;
use crate::protocol::ApiResponse;

/// Failures surfaced by the HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session {0} is not active")]
    SessionNotActive(u32),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("{0}")]
    Internal(String),
}

impl From<TradeError> for ApiError {
    fn from(e: TradeError) -> Self {
        ApiError::Game(GameError::Trade(e))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Background task failed: {}", e))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotActive(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Game(GameError::UnknownShop | GameError::UnknownItem) => StatusCode::NOT_FOUND,
            ApiError::Game(_) => StatusCode::BAD_REQUEST,
            ApiError::Persistence(PersistenceError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
