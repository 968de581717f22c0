//! Collection orchestration
//!
//! Two independent, best-effort operations:
//! - [`Collector::collect_trending_repos`]: one trending search, one snapshot upsert per result
//! - [`Collector::update_history`]: page through every tracked project and append a history row
//!
//! Neither operation raises to its caller. Failures are isolated per item and
//! returned as `(project_id, ItemOutcome)` pairs. Nothing is retried within a
//! run; the next scheduled run is the retry.

pub mod report;

use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::watch;

use crate::config::CollectorConfig;
use crate::github::ProjectApi;
use crate::models::{ProjectSnapshot, ProjectSummary};
use crate::storage::{run_blocking, SharedProjectRepository};
use crate::utils::error::{StorageError, TransportError};
use crate::utils::page_count;

pub use report::{CollectReport, HistorySweep, ItemOutcome, PageReport};

/// Job name of the trending collection
pub const COLLECT_JOB: &str = "collect";

/// Job name of the history sweep
pub const HISTORY_JOB: &str = "update_history";

/// Orchestrates search, detail fetches and persistence
pub struct Collector {
    api: Arc<dyn ProjectApi>,
    repo: SharedProjectRepository,
    config: CollectorConfig,

    /// `true` asks a running history sweep to stop
    cancel: watch::Sender<bool>,

    /// `true` once the process is shutting down; never reset
    halt: watch::Sender<bool>,
}

impl Collector {
    pub fn new(
        api: Arc<dyn ProjectApi>,
        repo: SharedProjectRepository,
        config: CollectorConfig,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        let (halt, _) = watch::channel(false);
        Self {
            api,
            repo,
            config,
            cancel,
            halt,
        }
    }

    /// Storage handle shared with the view layer
    pub fn repository(&self) -> &SharedProjectRepository {
        &self.repo
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Ask the running history sweep to stop after the current item
    ///
    /// Has no effect on a sweep started afterwards.
    pub fn cancel_sweep(&self) {
        self.cancel.send_replace(true);
        tracing::info!("History sweep cancellation requested");
    }

    /// Stop the running operation and refuse every later one
    ///
    /// Called once at process shutdown. Unlike [`Collector::cancel_sweep`],
    /// a sweep started afterwards stops immediately.
    pub fn halt(&self) {
        self.halt.send_replace(true);
        self.cancel.send_replace(true);
        tracing::info!("Collector halted");
    }

    pub fn is_halted(&self) -> bool {
        *self.halt.borrow()
    }

    /// Search for trending projects and upsert a snapshot for each
    ///
    /// A failed search yields an empty report. Every returned summary is kept
    /// in the report even when its upsert failed.
    pub async fn collect_trending_repos(&self) -> CollectReport {
        let run_date = Local::now().date_naive();
        let mut report = CollectReport::new(run_date);

        let mut halt = self.halt.subscribe();
        if *halt.borrow() {
            tracing::warn!("Collector halted, skipping trending collection");
            report.cancelled = true;
            return report;
        }

        // A rate-limit wait inside the search must not outlive shutdown
        let searched = tokio::select! {
            biased;
            _ = halt.wait_for(|stop| *stop) => None,
            result = self
                .api
                .search_trending(self.config.min_stars, self.config.search_page_size) => Some(result),
        };
        let Some(searched) = searched else {
            tracing::warn!("Trending search interrupted by shutdown");
            report.cancelled = true;
            return report;
        };

        let projects = match searched {
            Ok(projects) => projects,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    status = ?e.status(),
                    rate_limit_remaining = ?e.rate_limit_remaining(),
                    "Trending search failed"
                );
                crate::metrics::record_item_outcome(COLLECT_JOB, "search_failed");
                report.search_error = Some(e.to_string());
                return report;
            }
        };

        tracing::info!(count = projects.len(), %run_date, "Collecting trending projects");

        for summary in &projects {
            if *halt.borrow() {
                report.cancelled = true;
                break;
            }

            let snapshot = ProjectSnapshot::from_summary(summary, run_date);
            let outcome = match run_blocking(&self.repo, move |repo| repo.upsert_snapshot(&snapshot))
                .await
            {
                Ok(()) => {
                    tracing::debug!(project_id = summary.id, stars = summary.stars, "Snapshot stored");
                    ItemOutcome::Stored
                }
                Err(e) => {
                    tracing::warn!(
                        project_id = summary.id,
                        full_name = %summary.full_name,
                        error = %e,
                        "Snapshot upsert failed"
                    );
                    ItemOutcome::StorageFailed(e.to_string())
                }
            };

            crate::metrics::record_item_outcome(COLLECT_JOB, outcome.label());
            report.outcomes.push((summary.id, outcome));
        }

        report.projects = projects;

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Trending collection finished"
        );
        report
    }

    /// Append a history row for every tracked project
    ///
    /// Pages are read in primary-key order. Per-id failures are recorded and
    /// skipped; the page loop always runs to the end unless cancelled.
    pub async fn update_history(&self) -> HistorySweep {
        self.cancel.send_replace(false);
        let mut cancel = self.cancel.subscribe();
        let mut halt = self.halt.subscribe();

        let page_size = self.config.history_page_size;
        let mut sweep = HistorySweep {
            page_size,
            ..HistorySweep::default()
        };

        if *halt.borrow() {
            tracing::warn!("Collector halted, skipping history sweep");
            sweep.cancelled = true;
            return sweep;
        }

        sweep.total_projects = match run_blocking(&self.repo, |repo| repo.count_projects()).await {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(error = %e, "Could not count projects, skipping sweep");
                return sweep;
            }
        };
        sweep.total_pages = page_count(sweep.total_projects, page_size);
        crate::metrics::set_tracked_projects(sweep.total_projects);

        tracing::info!(
            total_projects = sweep.total_projects,
            total_pages = sweep.total_pages,
            page_size,
            "Starting history sweep"
        );

        for page in 0..sweep.total_pages {
            let mut report = PageReport {
                page,
                ..PageReport::default()
            };

            let offset = page * page_size;
            let ids = match run_blocking(&self.repo, move |repo| {
                repo.list_project_ids(page_size, offset)
            })
            .await
            {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Could not read project page");
                    report.error = Some(e.to_string());
                    sweep.pages.push(report);
                    continue;
                }
            };

            for project_id in ids {
                let stop_requested = *cancel.borrow() || *halt.borrow();
                if stop_requested {
                    sweep.cancelled = true;
                    break;
                }

                // The inter-call wait happens inside the detail call
                let detail = tokio::select! {
                    biased;
                    _ = cancel.wait_for(|stop| *stop) => None,
                    _ = halt.wait_for(|stop| *stop) => None,
                    detail = self.api.get_project_detail(project_id) => Some(detail),
                };
                let Some(detail) = detail else {
                    sweep.cancelled = true;
                    break;
                };

                let outcome = self.record_detail(project_id, detail).await;
                crate::metrics::record_item_outcome(HISTORY_JOB, outcome.label());
                report.outcomes.push((project_id, outcome));
            }

            tracing::debug!(
                page,
                succeeded = report.succeeded(),
                items = report.outcomes.len(),
                "History page finished"
            );
            sweep.pages.push(report);

            if sweep.cancelled {
                break;
            }
        }

        if sweep.cancelled {
            tracing::warn!(visited = sweep.visited(), "History sweep cancelled");
        } else {
            tracing::info!(
                visited = sweep.visited(),
                succeeded = sweep.succeeded(),
                failed = sweep.failed(),
                "History sweep finished"
            );
        }
        sweep
    }

    async fn record_detail(
        &self,
        requested_id: i64,
        detail: Result<ProjectSummary, TransportError>,
    ) -> ItemOutcome {
        let summary = match detail {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    project_id = requested_id,
                    error = %e,
                    status = ?e.status(),
                    rate_limit_remaining = ?e.rate_limit_remaining(),
                    "Detail fetch failed"
                );
                return ItemOutcome::TransportFailed(e.to_string());
            }
        };

        let metrics = summary.metrics();
        let verify = self.config.verify_project_exists;
        // Stamped when the detail arrived, not when the run began
        let collected_at = Utc::now().naive_utc();

        let result = run_blocking(&self.repo, move |repo| {
            if verify && !repo.project_exists(requested_id)? {
                return Err(StorageError::UnknownProject(requested_id));
            }
            repo.append_history(requested_id, metrics, collected_at)
        })
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(project_id = requested_id, stars = metrics.stars, "History appended");
                ItemOutcome::Stored
            }
            Err(e) => {
                tracing::warn!(project_id = requested_id, error = %e, "History append failed");
                ItemOutcome::StorageFailed(e.to_string())
            }
        }
    }
}
