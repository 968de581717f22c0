//! JSON API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::queries::{load_project_detail, load_project_page, ListQuery, ProjectPage};
use super::AppState;
use crate::error::{Error, Result, SchedulerError};
use crate::metrics;
use crate::scheduler::{CollectionScheduler, JobKind, JobStatus};
use crate::storage::run_blocking;
use crate::utils::format_date;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub tracked_projects: u64,
    pub history_rows: u64,
    pub latest_collect_date: Option<String>,
    pub scheduler_running: bool,
}

/// `POST /api/jobs/run` parameters
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Run a single job instead of collect-then-history
    pub job: Option<JobKind>,

    /// Block until the run finishes and return its report
    #[serde(default)]
    pub wait: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /api/health`
pub async fn health_check(State(state): State<AppState>) -> Result<Json<ApiResponse<HealthResponse>>> {
    let (tracked_projects, history_rows, latest) = run_blocking(&state.repo, |repo| {
        Ok((
            repo.count_projects()?,
            repo.count_history()?,
            repo.latest_collect_date()?,
        ))
    })
    .await?;

    Ok(Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        tracked_projects,
        history_rows,
        latest_collect_date: latest.map(format_date),
        scheduler_running: state.scheduler.as_ref().is_some_and(|s| s.is_started()),
    })))
}

/// `GET /api/projects`
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ApiResponse<ProjectPage>> {
    let page = load_project_page(&state.repo, &query).await;
    match page.error.clone() {
        Some(message) => Json(ApiResponse {
            success: false,
            data: Some(page),
            error: Some(message),
        }),
        None => Json(ApiResponse::success(page)),
    }
}

/// `GET /api/projects/{project_id}`
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Response> {
    match load_project_detail(&state.repo, project_id).await? {
        Some(detail) => Ok(Json(ApiResponse::success(detail)).into_response()),
        None => Err(Error::not_found(format!("project {project_id}"))),
    }
}

fn scheduler(state: &AppState) -> Result<&Arc<CollectionScheduler>> {
    state
        .scheduler
        .as_ref()
        .ok_or(Error::Scheduler(SchedulerError::NotStarted))
}

/// `GET /api/jobs`
pub async fn job_status(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<JobStatus>>>> {
    Ok(Json(ApiResponse::success(scheduler(&state)?.status())))
}

/// `POST /api/jobs/run`
///
/// Runs in the background and answers 202 unless `wait=true`.
/// Answers 409 while any requested job is running.
pub async fn run_jobs(
    State(state): State<AppState>,
    Query(request): Query<RunRequest>,
) -> Result<Response> {
    let scheduler = Arc::clone(scheduler(&state)?);

    let requested: Vec<JobKind> = match request.job {
        Some(kind) => vec![kind],
        None => JobKind::all().to_vec(),
    };
    if let Some(busy) = scheduler
        .status()
        .into_iter()
        .find(|s| s.running && requested.contains(&s.job))
    {
        return Err(SchedulerError::JobAlreadyRunning {
            job: busy.job.name().to_string(),
        }
        .into());
    }

    // Spawned so a dropped connection cannot cut the sequence short
    let run = tokio::spawn(run_requested(scheduler, request.job));

    if request.wait {
        let body = run
            .await
            .map_err(|e| Error::with_source("Manual run task failed", e))??;
        return Ok(Json(ApiResponse::success(body)).into_response());
    }

    tokio::spawn(async move {
        match run.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Manual run did not complete"),
            Err(e) => tracing::error!(error = %e, "Manual run task failed"),
        }
    });

    let names: Vec<&str> = requested.iter().map(|k| k.name()).collect();
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(format!("Started {}", names.join(", ")))),
    )
        .into_response())
}

/// Run one job, or collect then history, and serialize the report
async fn run_requested(
    scheduler: Arc<CollectionScheduler>,
    job: Option<JobKind>,
) -> Result<serde_json::Value> {
    let body = match job {
        Some(kind) => serde_json::to_value(scheduler.run_job(kind).await?)?,
        None => serde_json::to_value(scheduler.trigger_manual_collection().await?)?,
    };
    Ok(body)
}

/// `GET /metrics`
pub async fn prometheus_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to encode metrics: {e}"))),
        )
            .into_response(),
    }
}
