use std::io;

use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Active voting not found")]
    VotingNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token already used")]
    TokenUsed,

    #[error("Token expired")]
    TokenExpired,

    #[error("Voting is not active")]
    VotingInactive,

    #[error("Invalid choice")]
    InvalidChoice,

    #[error("Voting duration must be between {min} and {max} minutes")]
    InvalidDuration { min: u32, max: u32 },

    #[error("Voting is already active for this session")]
    VotingAlreadyActive,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Failed to render page")]
    Render(#[from] tera::Error),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::SessionNotFound | AppError::VotingNotFound | AppError::InvalidToken => {
                StatusCode::NOT_FOUND
            }
            AppError::TokenUsed
            | AppError::TokenExpired
            | AppError::VotingInactive
            | AppError::InvalidChoice
            | AppError::InvalidDuration { .. }
            | AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::VotingAlreadyActive => StatusCode::CONFLICT,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AppError::Render(e) = &self {
            error!("Page rendering failed: {e}");
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Failures that stop the process before or while serving.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid secret key")]
    SecretKey(#[from] hmac::digest::InvalidLength),

    #[error("Invalid page template: {0}")]
    Template(#[from] tera::Error),

    #[error("Failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("Server error: {0}")]
    Serve(#[from] io::Error),
}
