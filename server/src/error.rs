use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::import::ImportError;
use crate::staging::StagingError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("No chunks staged for import")]
    NoChunks,

    #[error("Ticket not found")]
    TicketNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Error importing tickets: {0}")]
    Import(ImportError),

    #[error("Staging area error: {0}")]
    Staging(StagingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::NoChunks => AppError::NoChunks,
            other => AppError::Import(other),
        }
    }
}

impl From<StagingError> for AppError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::NoChunks => AppError::NoChunks,
            StagingError::InvalidName => AppError::MalformedPayload,
            other => AppError::Staging(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload | AppError::NoChunks => StatusCode::BAD_REQUEST,
            AppError::TicketNotFound | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Import(_) | AppError::Staging(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
