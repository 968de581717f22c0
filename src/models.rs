// Core data structures for the startrail collector

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository summary as returned by the hosting API search and detail endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProjectSummary {
    pub id: i64, // Stable external identifier
    pub name: String,
    pub full_name: String, // "owner/name"
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "html_url")]
    pub url: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(rename = "stargazers_count", default)]
    pub stars: u64,
    #[serde(rename = "forks_count", default)]
    pub forks: u64,
    #[serde(rename = "watchers_count", default)]
    pub watchers: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProjectSummary {
    /// Popularity metrics carried by this summary
    pub fn metrics(&self) -> Metrics {
        Metrics {
            stars: self.stars,
            forks: self.forks,
            watchers: self.watchers,
        }
    }
}

/// Popularity counters for a project at one point in time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Metrics {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
}

/// Latest known state of a tracked project as of `collect_date`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub project_id: i64,
    pub repo_id: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub collect_date: NaiveDate,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
}

impl ProjectSnapshot {
    /// Build a snapshot from an API summary collected on `collect_date`
    ///
    /// The external full name doubles as `repo_id`.
    pub fn from_summary(summary: &ProjectSummary, collect_date: NaiveDate) -> Self {
        Self {
            project_id: summary.id,
            repo_id: summary.full_name.clone(),
            name: summary.name.clone(),
            full_name: summary.full_name.clone(),
            description: summary.description.clone(),
            url: summary.url.clone(),
            language: summary.language.clone(),
            collect_date,
            stars: summary.stars,
            forks: summary.forks,
            watchers: summary.watchers,
        }
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            stars: self.stars,
            forks: self.forks,
            watchers: self.watchers,
        }
    }
}

/// One append-only observation of a project's metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub project_id: i64,
    pub collect_date: NaiveDateTime,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
}

impl HistoryRecord {
    pub fn new(project_id: i64, metrics: Metrics, collect_date: NaiveDateTime) -> Self {
        Self {
            project_id,
            collect_date,
            stars: metrics.stars,
            forks: metrics.forks,
            watchers: metrics.watchers,
        }
    }
}

/// Page window over a counted result set
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number, clamped into range
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Largest page size a caller may request
    pub const MAX_PER_PAGE: u64 = 100;

    /// Default page size for listings
    pub const DEFAULT_PER_PAGE: u64 = 20;

    /// Clamp a requested page into `1..=total_pages`
    ///
    /// An empty result set still reports one (empty) page.
    pub fn new(total_items: u64, page: u64, per_page: u64) -> Self {
        let per_page = per_page.clamp(1, Self::MAX_PER_PAGE);
        let total_pages = crate::utils::page_count(total_items, per_page).max(1);
        let page = page.clamp(1, total_pages);

        Self {
            page,
            per_page,
            total_items,
            total_pages,
        }
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> ProjectSummary {
        ProjectSummary {
            id: 42,
            name: "tokio".to_string(),
            full_name: "tokio-rs/tokio".to_string(),
            description: Some("async runtime".to_string()),
            url: "https://github.com/tokio-rs/tokio".to_string(),
            language: Some("Rust".to_string()),
            stars: 500,
            forks: 40,
            watchers: 500,
            created_at: None,
        }
    }

    #[test]
    fn test_summary_deserializes_github_field_names() {
        let json = r#"{
            "id": 7,
            "name": "demo",
            "full_name": "octo/demo",
            "description": null,
            "html_url": "https://github.com/octo/demo",
            "language": "Go",
            "stargazers_count": 321,
            "forks_count": 12,
            "watchers_count": 321,
            "created_at": "2020-01-02T03:04:05Z",
            "owner": {"login": "octo"}
        }"#;

        let summary: ProjectSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.id, 7);
        assert_eq!(summary.full_name, "octo/demo");
        assert_eq!(summary.description, None);
        assert_eq!(summary.url, "https://github.com/octo/demo");
        assert_eq!(summary.stars, 321);
        assert_eq!(summary.forks, 12);
        assert!(summary.created_at.is_some());
    }

    #[test]
    fn test_summary_missing_counts_default_to_zero() {
        let json = r#"{"id": 1, "name": "a", "full_name": "o/a", "html_url": "u"}"#;
        let summary: ProjectSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.metrics(), Metrics::default());
    }

    #[test]
    fn test_snapshot_from_summary() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let snapshot = ProjectSnapshot::from_summary(&sample_summary(), date);

        assert_eq!(snapshot.project_id, 42);
        assert_eq!(snapshot.repo_id, "tokio-rs/tokio");
        assert_eq!(snapshot.collect_date, date);
        assert_eq!(snapshot.metrics().stars, 500);
    }

    #[test]
    fn test_pagination_clamps_page() {
        let p = Pagination::new(45, 9, 20);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.page, 3);
        assert_eq!(p.offset(), 40);
        assert!(p.has_prev());
        assert!(!p.has_next());

        let p = Pagination::new(45, 0, 20);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_empty_result() {
        let p = Pagination::new(0, 5, 20);
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.page, 1);
        assert!(!p.has_next());
    }

    #[test]
    fn test_pagination_caps_per_page() {
        let p = Pagination::new(1000, 1, 5000);
        assert_eq!(p.per_page, Pagination::MAX_PER_PAGE);
        assert_eq!(p.total_pages, 10);
    }
}
