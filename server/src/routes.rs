use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::import::{ImportOutcome, import_bytes, import_staged};
use crate::models::NewTicket;
use crate::state::AppState;

/// One-shot CSV upload and import.
pub async fn import_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (_, bytes) = read_upload(multipart).await?;

    let outcome = import_bytes(state.tickets.as_ref(), &bytes, state.config.batch_size).await?;

    Ok(import_response(outcome))
}

/// Stores one chunk of a larger CSV under its uploaded filename.
pub async fn upload_chunk_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (name, bytes) = read_upload(multipart).await?;

    state.staging.store_chunk(&name, &bytes).await?;
    info!(chunk = %name, "chunk staged");

    Ok(Json(json!({ "message": "Chunk uploaded successfully!" })))
}

/// Combines all staged chunks and imports the result.
pub async fn import_chunks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = import_staged(
        &state.staging,
        state.tickets.as_ref(),
        state.config.batch_size,
    )
    .await?;

    Ok(import_response(outcome))
}

pub async fn list_tickets_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.tickets.list().await?))
}

pub async fn create_ticket_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewTicket>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state.tickets.insert(payload).await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn update_ticket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<NewTicket>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.tickets.update(&id, payload).await?;

    // An unknown id answers 200 with a null body.
    Ok(Json(updated))
}

pub async fn delete_ticket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.tickets.delete(&id).await?;

    Ok(Json(json!({ "message": "Ticket deleted successfully" })))
}

pub async fn ticket_by_barcode_handler(
    State(state): State<Arc<AppState>>,
    Path(barcode): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state
        .tickets
        .find_by_barcode(&barcode)
        .await?
        .ok_or(AppError::TicketNotFound)?;

    Ok(Json(ticket))
}

pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.users.list().await?))
}

pub async fn user_by_username_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::UserNotFound)?;

    Ok(Json(user))
}

fn import_response(outcome: ImportOutcome) -> impl IntoResponse {
    Json(json!({
        "message": "Tickets imported successfully!",
        "inserted": outcome.inserted,
        "skipped": outcome.skipped,
    }))
}

/// First file field of a multipart upload: (filename, bytes).
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::MalformedPayload)?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = field.bytes().await.map_err(|_| AppError::MalformedPayload)?;
        return Ok((name, bytes.to_vec()));
    }

    Err(AppError::MalformedPayload)
}
