//! Batch insight handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use reverie_core::{defaults, Insight, InsightRepository, InsightType};
use reverie_jobs::{empty_range_message, InsightOutcome};

use super::AiActionResponse;
use crate::{owner_from_headers, ApiError, AppState};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GenerateInsightRequest {
    pub insight_type: InsightType,
    /// Defaults to the trailing 7 (weekly) or 30 (monthly) days.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Generate a weekly or monthly reflection over a date range.
#[utoipa::path(post, path = "/api/v1/insights", tag = "AI",
    request_body = GenerateInsightRequest,
    responses((status = 200, description = "Outcome", body = AiActionResponse)))]
pub async fn generate_insight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateInsightRequest>,
) -> Result<Json<AiActionResponse>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;

    let end = req.end_date.unwrap_or_else(|| Utc::now().date_naive());
    let start = req.start_date.unwrap_or_else(|| {
        let days = match req.insight_type {
            InsightType::Weekly => defaults::WEEKLY_RANGE_DAYS,
            InsightType::Monthly => defaults::MONTHLY_RANGE_DAYS,
        };
        end - Duration::days(days)
    });

    if start > end {
        return Err(ApiError::BadRequest(
            "start_date must not be after end_date".to_string(),
        ));
    }

    let outcome = state
        .processor
        .generate_insight(owner, req.insight_type, start, end)
        .await?;
    insight_outcome_response(outcome)
}

/// List insights, newest first.
#[utoipa::path(get, path = "/api/v1/insights", tag = "Insights",
    responses((status = 200, description = "Insights", body = [Insight])))]
pub async fn list_insights(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Insight>>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    let insights = state
        .db
        .insights
        .list(owner, defaults::PAGE_LIMIT)
        .await?;
    Ok(Json(insights))
}

/// Fetch one insight.
#[utoipa::path(get, path = "/api/v1/insights/{id}", tag = "Insights",
    responses((status = 200, description = "Insight", body = Insight),
              (status = 404, description = "Not found")))]
pub async fn get_insight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Insight>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    let insight = state
        .db
        .insights
        .fetch(id, owner)
        .await?
        .ok_or_else(|| ApiError::NotFound("Insight not found".to_string()))?;
    Ok(Json(insight))
}

/// Hard-delete an insight.
#[utoipa::path(delete, path = "/api/v1/insights/{id}", tag = "Insights",
    responses((status = 204, description = "Deleted"),
              (status = 404, description = "Not found")))]
pub async fn delete_insight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    if state.db.insights.delete(id, owner).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Insight not found".to_string()))
    }
}

/// Reset a failed insight to `pending` and regenerate it.
#[utoipa::path(post, path = "/api/v1/insights/{id}/retry", tag = "AI",
    responses((status = 200, description = "Outcome", body = AiActionResponse),
              (status = 404, description = "Not found"),
              (status = 409, description = "Not in a retryable status")))]
pub async fn retry_insight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AiActionResponse>, ApiError> {
    let owner = owner_from_headers(&headers, &state)?;
    let outcome = state.processor.retry_insight(id, owner).await?;
    insight_outcome_response(outcome)
}

fn insight_outcome_response(
    outcome: InsightOutcome,
) -> Result<Json<AiActionResponse>, ApiError> {
    match outcome {
        InsightOutcome::Ok { insight_id } => {
            Ok(Json(AiActionResponse::ok_with_insight(insight_id)))
        }
        InsightOutcome::Failed {
            insight_id,
            classified,
        } => {
            let mut response = AiActionResponse::from_classified(&classified);
            response.insight_id = Some(insight_id);
            Ok(Json(response))
        }
        InsightOutcome::EmptyRange { start, end } => {
            Ok(Json(AiActionResponse::failure(empty_range_message(
                start, end,
            ))))
        }
        InsightOutcome::NotFound => Err(ApiError::NotFound("Insight not found".to_string())),
        InsightOutcome::Skipped(status) => Err(ApiError::Conflict(format!(
            "Insight generation is already {}",
            status
        ))),
    }
}
