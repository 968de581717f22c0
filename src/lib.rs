//! startrail - trending GitHub project collector
//!
//! Collects the most-starred repositories once a day, keeps one snapshot row
//! per project and appends a metric history row per project per sweep.
//!
//! # Architecture
//!
//! - [`config`] - Configuration management and settings
//! - [`github`] - Hosting API client with rate limiting
//! - [`storage`] - SQLite snapshot and history tables
//! - [`collector`] - Trending collection and history sweeps
//! - [`scheduler`] - Daily job scheduling with per-job run locks
//! - [`web`] - HTML views and JSON API
//! - [`metrics`] - Prometheus metrics
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use startrail::collector::Collector;
//! use startrail::config::Config;
//! use startrail::github::GithubClient;
//! use startrail::storage::create_sqlite_repository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repo = create_sqlite_repository(&config.database.sqlite_path)?;
//!     let api = Arc::new(GithubClient::new(&config.github)?);
//!     let collector = Collector::new(api, repo, config.collector.clone());
//!     let report = collector.collect_trending_repos().await;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod github;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod storage;
pub mod utils;
pub mod web;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::collector::{CollectReport, Collector, HistorySweep, ItemOutcome};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, StartrailErrorTrait};
    pub use crate::github::{GithubClient, ProjectApi};
    pub use crate::models::{HistoryRecord, Metrics, ProjectSnapshot, ProjectSummary};
    pub use crate::scheduler::{CollectionScheduler, JobKind};
    pub use crate::storage::{ProjectRepository, SharedProjectRepository};
}

// Direct re-exports for convenience
pub use models::{HistoryRecord, Metrics, ProjectSnapshot, ProjectSummary};
