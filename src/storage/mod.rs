//! Durable storage for project snapshots and metric history
//!
//! Two tables live in one SQLite file:
//! - `github_project`: one row per tracked project, replaced on every collection
//! - `github_project_history`: append-only metric observations
//!
//! Every write commits on its own so a crash mid-run keeps earlier rows.

pub mod repository;
pub mod schema;

pub use repository::{
    create_sqlite_repository, MockProjectRepository, ProjectRepository,
    SchemaInspector, SharedProjectRepository, SharedSchemaInspector, SqliteProjectRepository,
};
pub use schema::{ColumnInfo, TableInfo, HISTORY_TABLE, SAMPLE_ROW_LIMIT, SNAPSHOT_TABLE};

use std::sync::Arc;

use crate::utils::error::{StorageError, StorageResult};

/// Run a storage call on the blocking pool
///
/// SQLite calls block, so async callers hop off the runtime workers.
pub async fn run_blocking<T, F>(repo: &SharedProjectRepository, f: F) -> StorageResult<T>
where
    F: FnOnce(&dyn ProjectRepository) -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    let repo = Arc::clone(repo);
    tokio::task::spawn_blocking(move || f(repo.as_ref()))
        .await
        .map_err(|e| StorageError::TaskFailed(e.to_string()))?
}
