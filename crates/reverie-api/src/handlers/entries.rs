//! Journal entry handlers: CRUD plus the AI action endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use reverie_ai::validate_content;
use reverie_core::{defaults, CreateEntryRequest, Entry, EntryRepository, UpdateEntryRequest};
use reverie_jobs::ProcessOutcome;

use super::AiActionResponse;
use crate::{owner_from_headers, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// With `end_date`, restricts the listing to a date range.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Create a journal entry.
///
/// The entry is persisted with `ai_status = pending`; analysis is a
/// separate, explicitly triggered unit of work (`POST .../process`).
#[utoipa::path(post, path = "/api/v1/entries", tag = "Entries",
    request_body = CreateEntryRequest,
    responses((status = 201, description = "Created", body = Entry),
              (status = 400, description = "Content outside accepted bounds")))]
pub async fn create_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<Entry>), ApiError> {
    let owner = owner_from_headers(&headers, &state)?;

    // Same bounds the AI validator enforces, rejected at the form boundary
    // so an impossible job is never stored.
    if let Some(classified) = validate_content(&req.content) {
        return Err(ApiError::BadRequest(classified.user_message));
    }

    let id = state.db.entries.insert(owner, req).await?;
    let entry = state
        .db
        .entries
        .fetch(id, owner)
        .await?
        .ok_or_else(|| ApiError::Internal("Created entry vanished".to_string()))?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// List entries, newest first, optionally restricted to a date range.
#[utoipa::path(get, path = "/api/v1/entries", tag = "Entries",
    responses((status = 200, description = "Entries", body = [Entry])))]
pub async fn list_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;

    let entries = match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => {
            state.db.entries.list_by_date_range(owner, start, end).await?
        }
        _ => {
            let limit = query.limit.unwrap_or(defaults::PAGE_LIMIT);
            let offset = query.offset.unwrap_or(defaults::PAGE_OFFSET);
            state.db.entries.list(owner, limit, offset).await?
        }
    };

    Ok(Json(entries))
}

/// Fetch one entry.
#[utoipa::path(get, path = "/api/v1/entries/{id}", tag = "Entries",
    responses((status = 200, description = "Entry", body = Entry),
              (status = 404, description = "Not found")))]
pub async fn get_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Entry>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    let entry = state
        .db
        .entries
        .fetch(id, owner)
        .await?
        .ok_or_else(|| ApiError::NotFound("Entry not found".to_string()))?;
    Ok(Json(entry))
}

/// Update an entry. A content change resets the stored analysis to
/// `pending`.
#[utoipa::path(patch, path = "/api/v1/entries/{id}", tag = "Entries",
    request_body = UpdateEntryRequest,
    responses((status = 200, description = "Updated", body = Entry),
              (status = 404, description = "Not found")))]
pub async fn update_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<Json<Entry>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;

    if let Some(ref content) = req.content {
        if let Some(classified) = validate_content(content) {
            return Err(ApiError::BadRequest(classified.user_message));
        }
    }

    if !state.db.entries.update(id, owner, req).await? {
        return Err(ApiError::NotFound("Entry not found".to_string()));
    }

    let entry = state
        .db
        .entries
        .fetch(id, owner)
        .await?
        .ok_or_else(|| ApiError::NotFound("Entry not found".to_string()))?;
    Ok(Json(entry))
}

/// Hard-delete an entry.
#[utoipa::path(delete, path = "/api/v1/entries/{id}", tag = "Entries",
    responses((status = 204, description = "Deleted"),
              (status = 404, description = "Not found")))]
pub async fn delete_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    if state.db.entries.delete(id, owner).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Entry not found".to_string()))
    }
}

/// Trigger AI analysis for a `pending` entry (phase 2 of creation).
#[utoipa::path(post, path = "/api/v1/entries/{id}/process", tag = "AI",
    responses((status = 200, description = "Outcome", body = AiActionResponse),
              (status = 404, description = "Not found"),
              (status = 409, description = "Not in a processable status")))]
pub async fn process_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AiActionResponse>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    let outcome = state.processor.process_entry(id, owner).await?;
    entry_outcome_response(outcome)
}

/// Reset a `failed` entry to `pending` and re-run analysis.
#[utoipa::path(post, path = "/api/v1/entries/{id}/retry", tag = "AI",
    responses((status = 200, description = "Outcome", body = AiActionResponse),
              (status = 404, description = "Not found"),
              (status = 409, description = "Not in a retryable status")))]
pub async fn retry_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AiActionResponse>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    let outcome = state.processor.retry_entry(id, owner).await?;
    entry_outcome_response(outcome)
}

/// Discard a successful analysis and recompute it.
#[utoipa::path(post, path = "/api/v1/entries/{id}/regenerate", tag = "AI",
    responses((status = 200, description = "Outcome", body = AiActionResponse),
              (status = 404, description = "Not found"),
              (status = 409, description = "Not in a regenerable status")))]
pub async fn regenerate_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AiActionResponse>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    let outcome = state.processor.regenerate_entry(id, owner).await?;
    entry_outcome_response(outcome)
}

fn entry_outcome_response(outcome: ProcessOutcome) -> Result<Json<AiActionResponse>, ApiError> {
    match outcome {
        ProcessOutcome::Ok => Ok(Json(AiActionResponse::ok())),
        ProcessOutcome::Failed(classified) => {
            Ok(Json(AiActionResponse::from_classified(&classified)))
        }
        ProcessOutcome::NotFound => Err(ApiError::NotFound("Entry not found".to_string())),
        ProcessOutcome::Skipped(status) => Err(ApiError::Conflict(format!(
            "Entry analysis is already {}",
            status
        ))),
    }
}
