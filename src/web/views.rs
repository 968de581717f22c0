//! Server-rendered HTML pages

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;

use super::queries::{load_project_detail, load_project_page, ListQuery};
use super::templates::{
    script_json, DATABASE_TEMPLATE, INDEX_TEMPLATE, NOT_FOUND_TEMPLATE, PROJECT_TEMPLATE,
    TABLE_TEMPLATE,
};
use super::AppState;
use crate::error::{Error, Result};
use crate::storage::{SchemaInspector, SharedSchemaInspector};
use crate::utils::error::{StorageError, StorageResult};
use crate::utils::format_timestamp;

/// Run a catalog call on the blocking pool
async fn inspect<T, F>(inspector: &SharedSchemaInspector, f: F) -> StorageResult<T>
where
    F: FnOnce(&dyn SchemaInspector) -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    let inspector = SharedSchemaInspector::clone(inspector);
    tokio::task::spawn_blocking(move || f(inspector.as_ref()))
        .await
        .map_err(|e| StorageError::TaskFailed(e.to_string()))?
}

fn not_found(state: &AppState, message: String) -> Result<Response> {
    let html = state.templates.render(
        NOT_FOUND_TEMPLATE,
        &json!({ "title": "Not found", "message": message }),
    )?;
    Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>> {
    let page = load_project_page(&state.repo, &query).await;
    let html = state.templates.render(
        INDEX_TEMPLATE,
        &json!({ "title": "Trending projects", "page": page }),
    )?;
    Ok(Html(html))
}

/// `GET /project/{project_id}`
pub async fn project_detail(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Response> {
    let Some(detail) = load_project_detail(&state.repo, project_id).await? else {
        return not_found(&state, format!("Project {project_id} is not tracked"));
    };

    let history_json = script_json(&detail.history)?;
    let html = state.templates.render(
        PROJECT_TEMPLATE,
        &json!({
            "title": detail.project.full_name,
            "project": detail.project,
            "history": detail.history,
            "history_json": history_json,
            "since": format_timestamp(detail.since),
        }),
    )?;
    Ok(Html(html).into_response())
}

/// `GET /admin/database`
pub async fn database(State(state): State<AppState>) -> Result<Html<String>> {
    let (tables, error) = match &state.inspector {
        Some(inspector) => match inspect(inspector, |i| i.list_tables()).await {
            Ok(tables) => (tables, None),
            Err(e) => {
                tracing::warn!(error = %e, "Listing tables failed");
                (Vec::new(), Some(format!("Listing tables failed: {e}")))
            }
        },
        None => (
            Vec::new(),
            Some("Schema inspection is not available for this backend".to_string()),
        ),
    };

    let html = state.templates.render(
        DATABASE_TEMPLATE,
        &json!({ "title": "Database", "tables": tables, "error": error }),
    )?;
    Ok(Html(html))
}

/// `GET /admin/database/table/{name}`
pub async fn table(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let Some(inspector) = &state.inspector else {
        return Err(Error::not_found("schema inspection"));
    };

    let lookup = name.clone();
    let Some(info) = inspect(inspector, move |i| i.describe_table(&lookup)).await? else {
        return not_found(&state, format!("No table named {name}"));
    };

    let html = state.templates.render(
        TABLE_TEMPLATE,
        &json!({ "title": format!("Table {}", info.name), "table": info }),
    )?;
    Ok(Html(html).into_response())
}
