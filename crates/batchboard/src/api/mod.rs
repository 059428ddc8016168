use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::api::models::{ApiError, DaysQuery};
use crate::clock::Clock;
use crate::jobs::model::{JobExecutionsParams, JobInstancesParams};
use crate::jobs::{ExecutionStore, QueryEngine, StatisticsEngine};

pub mod models;

/// Body message of every 500; the cause is only logged.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

#[derive(Clone)]
pub struct ApiState<S> {
    pub queries: QueryEngine<S>,
    pub statistics: StatisticsEngine<S>,
    pub clock: Arc<dyn Clock>,
    /// Window used by the statistics routes when `days` is not given.
    pub default_days: i64,
}

impl<S: ExecutionStore> ApiState<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, default_days: i64) -> Self {
        Self {
            queries: QueryEngine::new(store.clone()),
            statistics: StatisticsEngine::new(store, clock.clone()),
            clock,
            default_days,
        }
    }
}

impl<S> ApiState<S> {
    fn error_response(&self, status: StatusCode, message: String, uri: &Uri) -> Response {
        let body = ApiError {
            timestamp: self.clock.now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            path: uri.path().to_string(),
        };
        (status, Json(body)).into_response()
    }

    fn not_found(&self, uri: &Uri, message: String) -> Response {
        self.error_response(StatusCode::NOT_FOUND, message, uri)
    }

    fn bad_request(&self, uri: &Uri, message: String) -> Response {
        self.error_response(StatusCode::BAD_REQUEST, message, uri)
    }

    fn internal(&self, uri: &Uri, e: anyhow::Error) -> Response {
        error!(path = %uri.path(), error = ?e, "request failed");
        self.error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_ERROR_MESSAGE.to_string(),
            uri,
        )
    }
}

pub fn router<S: ExecutionStore>(state: ApiState<S>) -> Router {
    Router::new()
        // Job instances
        .route("/api/job_instances", get(list_job_instances::<S>))
        .route("/api/job_instances/:id", get(get_job_instance::<S>))
        // Job executions
        .route("/api/job_executions", get(list_job_executions::<S>))
        .route("/api/job_executions/:id", get(get_job_execution::<S>))
        // Step executions
        .route("/api/step_executions/:id", get(get_step_execution::<S>))
        // Statistics
        .route("/api/statistics/jobs", get(job_statistics::<S>))
        .route("/api/statistics/jobs/:job_name", get(job_statistics_by_name::<S>))
        .route("/api/statistics/recent_executions", get(recent_executions::<S>))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn list_job_instances<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    params: Result<Query<JobInstancesParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(q) => q,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    match state.queries.find_job_instances(&params).await {
        Ok(page) => ok(page),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn get_job_instance<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    match state.queries.get_job_instance_detail(id).await {
        Ok(Some(detail)) => ok(detail),
        Ok(None) => state.not_found(&uri, format!("Job instance not found (jobInstanceId: {id})")),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn list_job_executions<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    params: Result<Query<JobExecutionsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(q) => q,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    match state.queries.find_job_executions(&params).await {
        Ok(page) => ok(page),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn get_job_execution<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    match state.queries.get_job_execution_detail(id).await {
        Ok(Some(detail)) => ok(detail),
        Ok(None) => state.not_found(
            &uri,
            format!("Job execution not found (jobExecutionId: {id})"),
        ),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn get_step_execution<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    match state.queries.get_step_execution_detail(id).await {
        Ok(Some(detail)) => ok(detail),
        Ok(None) => state.not_found(
            &uri,
            format!("Step execution not found (stepExecutionId: {id})"),
        ),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn job_statistics<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    query: Result<Query<DaysQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    let days = query.days.unwrap_or(state.default_days);
    match state.statistics.get_job_statistics(days).await {
        Ok(stats) => ok(stats),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn job_statistics_by_name<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    job_name: Result<Path<String>, PathRejection>,
) -> Response {
    let Path(job_name) = match job_name {
        Ok(p) => p,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    match state.statistics.get_job_statistics_by_job_name(&job_name).await {
        Ok(Some(stats)) => ok(stats),
        Ok(None) => state.not_found(
            &uri,
            format!("Job statistics not found (jobName: {job_name})"),
        ),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn recent_executions<S: ExecutionStore>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    query: Result<Query<DaysQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rej) => return state.bad_request(&uri, rej.body_text()),
    };
    let days = query.days.unwrap_or(state.default_days);
    match state.statistics.get_job_execution_stats(days).await {
        Ok(stats) => ok(stats),
        Err(e) => state.internal(&uri, e),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
