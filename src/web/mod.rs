//! HTTP surface: HTML views, JSON API and metrics endpoint
//!
//! | Route                               | Handler                  |
//! |-------------------------------------|--------------------------|
//! | `GET /`                             | trending snapshot listing |
//! | `GET /project/{project_id}`         | project detail + history |
//! | `GET /admin/database`               | table list               |
//! | `GET /admin/database/table/{name}`  | table structure + sample |
//! | `GET /api/projects`                 | JSON listing             |
//! | `GET /api/projects/{project_id}`    | JSON detail              |
//! | `GET /api/health`                   | health                   |
//! | `GET /api/jobs`                     | job status               |
//! | `POST /api/jobs/run`                | manual collection        |
//! | `GET /metrics`                      | Prometheus exposition    |

pub mod api;
pub mod queries;
pub mod templates;
pub mod views;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{Error, SchedulerError, StartrailErrorTrait, StorageError};
use crate::scheduler::CollectionScheduler;
use crate::storage::{SharedProjectRepository, SharedSchemaInspector};

pub use api::{ApiResponse, ErrorResponse, HealthResponse};
pub use queries::{ListQuery, ProjectDetail, ProjectPage};
pub use templates::Templates;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repo: SharedProjectRepository,

    /// Absent when the backend has no catalog to inspect
    pub inspector: Option<SharedSchemaInspector>,

    /// Absent for read-only servers
    pub scheduler: Option<Arc<CollectionScheduler>>,

    pub templates: Arc<Templates>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(repo: SharedProjectRepository) -> crate::error::Result<Self> {
        Ok(Self {
            repo,
            inspector: None,
            scheduler: None,
            templates: Arc::new(Templates::new()?),
            start_time: Instant::now(),
        })
    }

    pub fn with_inspector(mut self, inspector: SharedSchemaInspector) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<CollectionScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

/// Create the router with every route
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // HTML views
        .route("/", get(views::index))
        .route("/project/{project_id}", get(views::project_detail))
        .route("/admin/database", get(views::database))
        .route("/admin/database/table/{name}", get(views::table))
        // JSON API
        .route("/api/health", get(api::health_check))
        .route("/api/projects", get(api::list_projects))
        .route("/api/projects/{project_id}", get(api::get_project))
        .route("/api/jobs", get(api::job_status))
        .route("/api/jobs/run", post(api::run_jobs))
        .route("/metrics", get(api::prometheus_metrics))
        .with_state(state)
}

/// Router plus the configured middleware layers
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = create_router(state);

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown_signal` resolves
pub async fn serve(
    state: AppState,
    config: &ServerConfig,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> crate::error::Result<()> {
    let router = build_router(state, config);
    let addr = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::with_source(format!("Failed to bind {addr}"), e))?;

    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Status code for an error surfaced by a handler
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) | Error::Storage(StorageError::UnknownProject(_)) => {
            StatusCode::NOT_FOUND
        }
        Error::Scheduler(SchedulerError::JobAlreadyRunning { .. }) => StatusCode::CONFLICT,
        Error::Scheduler(SchedulerError::NotStarted) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                category = self.category().description(),
                recoverable = self.is_recoverable(),
                "Request failed"
            );
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
