use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use scholaris_core::health::{HealthConfig, HealthRun, RunOutcome};

const DEFAULT_RUN_LIMIT: usize = 20;
const MAX_RUN_LIMIT: usize = 500;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest {
    triggered_by: String,
}

/// Run every checker and return the outcome.
async fn run_health_check(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunRequest>,
) -> ApiResult<Json<RunOutcome>> {
    if body.triggered_by.trim().is_empty() {
        return Err(ApiError::BadRequest("triggeredBy must not be empty".to_string()));
    }
    let outcome = state.health_service.run_full_check(&body.triggered_by).await;
    if !outcome.success {
        tracing::warn!("Health run did not complete: {:?}", outcome.errors);
    }
    Ok(Json(outcome))
}

#[derive(serde::Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

/// List past runs, newest first.
async fn list_health_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<HealthRun>>> {
    let limit = params.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);
    let runs = state.health_service.list_runs(limit).await?;
    Ok(Json(runs))
}

async fn get_health_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<HealthRun>> {
    let run = state.health_service.get_run(&id).await?;
    Ok(Json(run))
}

/// Get health configuration.
async fn get_health_config(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthConfig>> {
    let config = state.health_service.get_config().await;
    Ok(Json(config))
}

/// Update health configuration.
async fn update_health_config(
    State(state): State<Arc<AppState>>,
    Json(config): Json<HealthConfig>,
) -> ApiResult<Json<HealthConfig>> {
    state.health_service.update_config(config).await?;
    Ok(Json(state.health_service.get_config().await))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health/run", post(run_health_check))
        .route("/health/runs", get(list_health_runs))
        .route("/health/runs/{id}", get(get_health_run))
        .route(
            "/health/config",
            get(get_health_config).put(update_health_config),
        )
}
