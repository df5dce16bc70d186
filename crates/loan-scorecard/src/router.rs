use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::error::AppError;
use crate::scoring::ApplicantAttributes;
use crate::service::{ScorecardService, SetWeightsOutcome, WeightServiceError};
use crate::weights::WeightSet;

const DEFAULT_HISTORY_LIMIT: usize = 3;

/// Router exposing scoring and weight configuration endpoints.
pub fn scorecard_router(service: Arc<ScorecardService>) -> Router {
    Router::new()
        .route("/api/v1/scoring/score", post(score_handler))
        .route("/api/v1/weights", get(weights_handler).put(set_weights_handler))
        .route("/api/v1/weights/reset", post(reset_handler))
        .route("/api/v1/weights/history", get(history_handler))
        .route("/api/v1/weights/rollback", post(rollback_handler))
        .route("/api/v1/weights/resolve", post(resolve_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct WeightUpdate {
    weights: WeightSet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RollbackRequest {
    #[serde(default = "default_steps")]
    steps: usize,
}

fn default_steps() -> usize {
    1
}

pub(crate) async fn score_handler(
    State(service): State<Arc<ScorecardService>>,
    axum::Json(applicant): axum::Json<ApplicantAttributes>,
) -> Response {
    match service.score(&applicant) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub(crate) async fn weights_handler(State(service): State<Arc<ScorecardService>>) -> Response {
    let active = service.get_weights();
    let payload = json!({
        "active": active.as_ref(),
        "sync": service.sync_state(),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn set_weights_handler(
    State(service): State<Arc<ScorecardService>>,
    axum::Json(update): axum::Json<WeightUpdate>,
) -> Response {
    write_outcome(blocking(service, move |service| service.set_weights(update.weights)).await)
}

pub(crate) async fn reset_handler(State(service): State<Arc<ScorecardService>>) -> Response {
    write_outcome(blocking(service, |service| service.reset_to_defaults()).await)
}

pub(crate) async fn rollback_handler(
    State(service): State<Arc<ScorecardService>>,
    axum::Json(request): axum::Json<RollbackRequest>,
) -> Response {
    write_outcome(blocking(service, move |service| service.rollback(request.steps)).await)
}

pub(crate) async fn history_handler(
    State(service): State<Arc<ScorecardService>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let entries = service.history(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
    (StatusCode::OK, axum::Json(json!({ "entries": entries }))).into_response()
}

pub(crate) async fn resolve_handler(State(service): State<Arc<ScorecardService>>) -> Response {
    match blocking(service, |service| service.resolve_divergence()).await {
        Ok(Ok(active)) => (StatusCode::OK, axum::Json(active.as_ref().clone())).into_response(),
        Ok(Err(WeightServiceError::Sync(err))) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Ok(Err(err)) => AppError::from(err).into_response(),
        Err(response) => response,
    }
}

/// Store writes block on file I/O and retry backoff, so they run off the async workers.
async fn blocking<T, F>(service: Arc<ScorecardService>, task: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&ScorecardService) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || task(&service))
        .await
        .map_err(|err| {
            error!(error = %err, "weight write task failed");
            let payload = json!({ "error": "weight write task failed" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        })
}

fn write_outcome(
    result: Result<Result<SetWeightsOutcome, WeightServiceError>, Response>,
) -> Response {
    match result {
        Ok(Ok(outcome @ SetWeightsOutcome::Applied { .. })) => {
            (StatusCode::OK, axum::Json(outcome)).into_response()
        }
        Ok(Ok(outcome @ SetWeightsOutcome::Diverged { .. })) => {
            (StatusCode::CONFLICT, axum::Json(outcome)).into_response()
        }
        Ok(Err(err)) => AppError::from(err).into_response(),
        Err(response) => response,
    }
}
