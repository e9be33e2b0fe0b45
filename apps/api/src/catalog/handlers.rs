//! Axum route handlers for the catalog API.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::catalog::filter::SearchFilters;
use crate::catalog::rating::RatingSample;
use crate::errors::AppError;
use crate::models::dimension::{DepartmentFunction, NamedEntity};
use crate::models::prompt::{PromptView, RatingUpdate};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub message: String,
    #[serde(flatten)]
    pub update: RatingUpdate,
}

/// Parses an id path segment. Anything that is not an `i32` is a client error.
fn parse_id(raw: &str, kind: &str) -> Result<i32, AppError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| AppError::Validation(format!("Invalid {kind} ID '{raw}'")))
}

/// GET /api/prompts
pub async fn handle_search(
    State(state): State<AppState>,
    Query(filters): Query<SearchFilters>,
) -> Result<Json<Vec<PromptView>>, AppError> {
    let predicates = filters.predicates();
    let prompts = state.store.search(&predicates).await?;
    Ok(Json(prompts))
}

/// POST /api/prompts/:id/rating
///
/// The body is taken as untyped JSON so every malformed shape ends up as the
/// same validation error. All validation happens before the store is touched.
pub async fn handle_rate(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RateResponse>, AppError> {
    let prompt_id = parse_id(&raw_id, "prompt")?;
    let Json(body) = body.map_err(|e| {
        AppError::Validation(format!("Invalid rating request: {}", e.body_text()))
    })?;
    let sample = RatingSample::from_json(&body)?;

    let update = state.store.rate(prompt_id, sample).await?;
    Ok(Json(RateResponse {
        message: "Rating added successfully.".to_string(),
        update,
    }))
}

/// GET /api/departments
pub async fn handle_list_departments(
    State(state): State<AppState>,
) -> Result<Json<Vec<NamedEntity>>, AppError> {
    Ok(Json(state.store.list_departments().await?))
}

/// GET /api/functions
pub async fn handle_list_functions(
    State(state): State<AppState>,
) -> Result<Json<Vec<NamedEntity>>, AppError> {
    Ok(Json(state.store.list_functions().await?))
}

/// GET /api/activities
pub async fn handle_list_activities(
    State(state): State<AppState>,
) -> Result<Json<Vec<NamedEntity>>, AppError> {
    Ok(Json(state.store.list_activities().await?))
}

/// GET /api/department-functions
pub async fn handle_department_functions(
    State(state): State<AppState>,
) -> Result<Json<Vec<DepartmentFunction>>, AppError> {
    Ok(Json(state.store.department_functions().await?))
}

/// GET /api/departments/:id/functions
pub async fn handle_functions_of(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<NamedEntity>>, AppError> {
    let department_id = parse_id(&raw_id, "department")?;
    let functions = state.store.functions_of(department_id).await?;
    if functions.is_empty() {
        return Err(AppError::NotFound(format!(
            "No functions found for department {department_id}"
        )));
    }
    Ok(Json(functions))
}

/// GET /api/functions/:id/activities
pub async fn handle_activities_of(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<NamedEntity>>, AppError> {
    let function_id = parse_id(&raw_id, "function")?;
    let activities = state.store.activities_of(function_id).await?;
    if activities.is_empty() {
        return Err(AppError::NotFound(format!(
            "No activities found for function {function_id}"
        )));
    }
    Ok(Json(activities))
}
