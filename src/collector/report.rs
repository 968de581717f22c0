//! Per-item outcome reports for collection runs

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::ProjectSummary;

/// What happened to one project within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ItemOutcome {
    Stored,
    TransportFailed(String),
    StorageFailed(String),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored)
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::TransportFailed(_) => "transport_failed",
            Self::StorageFailed(_) => "storage_failed",
        }
    }
}

fn count_successes<'a>(outcomes: impl Iterator<Item = &'a (i64, ItemOutcome)>) -> usize {
    outcomes.filter(|(_, o)| o.is_success()).count()
}

/// Result of one trending collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectReport {
    /// Local date stamped on every snapshot of the run
    pub run_date: NaiveDate,

    /// Every summary the search returned, stored or not
    #[serde(skip)]
    pub projects: Vec<ProjectSummary>,

    /// One entry per returned summary, in search order
    pub outcomes: Vec<(i64, ItemOutcome)>,

    /// Set when the search itself failed and nothing was collected
    pub search_error: Option<String>,

    /// The run stopped early because the collector was halted
    pub cancelled: bool,
}

impl CollectReport {
    pub(crate) fn new(run_date: NaiveDate) -> Self {
        Self {
            run_date,
            projects: Vec::new(),
            outcomes: Vec::new(),
            search_error: None,
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> usize {
        count_successes(self.outcomes.iter())
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// One-line outcome for status displays
    pub fn summary(&self) -> String {
        match &self.search_error {
            Some(err) => format!("search failed: {err}"),
            None => format!(
                "{} projects, {} stored, {} failed{}",
                self.projects.len(),
                self.succeeded(),
                self.failed(),
                if self.cancelled { ", cancelled" } else { "" }
            ),
        }
    }

    /// Ids of the projects that were returned by the search
    pub fn project_ids(&self) -> Vec<i64> {
        self.projects.iter().map(|p| p.id).collect()
    }
}

/// Outcomes for one page of a history sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageReport {
    /// Zero-based page index
    pub page: u64,
    pub outcomes: Vec<(i64, ItemOutcome)>,

    /// Set when the page of ids itself could not be read
    pub error: Option<String>,
}

impl PageReport {
    pub fn succeeded(&self) -> usize {
        count_successes(self.outcomes.iter())
    }
}

/// Result of one history sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistorySweep {
    /// Snapshot rows counted when the sweep started
    pub total_projects: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub pages: Vec<PageReport>,

    /// The sweep stopped early on request
    pub cancelled: bool,
}

impl HistorySweep {
    /// Every (id, outcome) pair across all visited pages
    pub fn outcomes(&self) -> impl Iterator<Item = &(i64, ItemOutcome)> {
        self.pages.iter().flat_map(|p| p.outcomes.iter())
    }

    pub fn visited(&self) -> usize {
        self.outcomes().count()
    }

    pub fn succeeded(&self) -> usize {
        count_successes(self.outcomes())
    }

    pub fn failed(&self) -> usize {
        self.visited() - self.succeeded()
    }

    /// One-line outcome for status displays
    pub fn summary(&self) -> String {
        format!(
            "{}/{} pages, {} stored, {} failed{}",
            self.pages.len(),
            self.total_pages,
            self.succeeded(),
            self.failed(),
            if self.cancelled { ", cancelled" } else { "" }
        )
    }
}
