//! Call and problem listings: JSON list, table view and CSV export
//!
//! All three renderings of a ledger share one filter parse and one query.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use std::collections::HashMap;

use super::AppState;
use crate::error::AppError;
use crate::ledger::{CallRecord, ProblemRecord};
use crate::query::render::{self, ListView, TableView, Tabular};
use crate::query::QueryFilters;

type Params = Query<HashMap<String, String>>;

async fn fetch_calls(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<(Vec<CallRecord>, QueryFilters), AppError> {
    let filters = QueryFilters::from_params(params, &state.query);
    let records = state.ledger.list_calls(&filters).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list requests");
        AppError::InternalError("Failed to retrieve requests".to_string())
    })?;
    Ok((records, filters))
}

async fn fetch_problems(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<(Vec<ProblemRecord>, QueryFilters), AppError> {
    let filters = QueryFilters::from_params(params, &state.query);
    let records = state.ledger.list_problems(&filters).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list problems");
        AppError::InternalError("Failed to retrieve problems".to_string())
    })?;
    Ok((records, filters))
}

/// GET /api/requests
pub async fn list_requests(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<ListView<CallRecord>>, AppError> {
    let (records, filters) = fetch_calls(&state, &params).await?;
    Ok(Json(render::list(records, filters.page)))
}

/// GET /api/requests/table
pub async fn requests_table(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<TableView>, AppError> {
    let (records, filters) = fetch_calls(&state, &params).await?;
    Ok(Json(render::table(&records, filters.page)))
}

/// GET /api/requests/csv
pub async fn requests_csv(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Response, AppError> {
    let (records, _) = fetch_calls(&state, &params).await?;
    csv_attachment("requests.csv", &records)
}

/// GET /api/problems
pub async fn list_problems(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<ListView<ProblemRecord>>, AppError> {
    let (records, filters) = fetch_problems(&state, &params).await?;
    Ok(Json(render::list(records, filters.page)))
}

/// GET /api/problems/table
pub async fn problems_table(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<TableView>, AppError> {
    let (records, filters) = fetch_problems(&state, &params).await?;
    Ok(Json(render::table(&records, filters.page)))
}

/// GET /api/problems/csv
pub async fn problems_csv(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Response, AppError> {
    let (records, _) = fetch_problems(&state, &params).await?;
    csv_attachment("problems.csv", &records)
}

fn csv_attachment<T: Tabular>(filename: &str, records: &[T]) -> Result<Response, AppError> {
    let body = render::to_csv(records).map_err(|e| {
        tracing::error!(error = %e, "Failed to generate CSV");
        AppError::InternalError("Failed to generate CSV".to_string())
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename={}", filename)),
        ],
        body,
    )
        .into_response())
}
