pub mod collect;
pub mod db;
pub mod serve;

use anyhow::{Context, Result};
use std::sync::Arc;

use startrail::collector::Collector;
use startrail::config::Config;
use startrail::github::GithubClient;
use startrail::storage::{create_sqlite_repository, SqliteProjectRepository};

// Re-export command functions for convenience
pub use collect::{collect, history, run_once};
pub use db::{init_db, stats};
pub use serve::{serve, ServeParams};

/// Open the configured SQLite database, creating it if needed
pub(crate) fn open_repository(config: &Config) -> Result<Arc<SqliteProjectRepository>> {
    let path = &config.database.sqlite_path;
    create_sqlite_repository(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

/// Wire the API client and repository into a collector
pub(crate) fn build_collector(
    config: &Config,
    repo: Arc<SqliteProjectRepository>,
) -> Result<Arc<Collector>> {
    let client = GithubClient::new(&config.github).context("Failed to build API client")?;
    Ok(Arc::new(Collector::new(
        Arc::new(client),
        repo,
        config.collector.clone(),
    )))
}
