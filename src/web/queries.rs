//! Read-side queries shared by the HTML and JSON views
//!
//! Listing failures never become request failures: the page comes back
//! empty with a message instead.

use chrono::{Local, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{HistoryRecord, Pagination, ProjectSnapshot};
use crate::storage::{run_blocking, SharedProjectRepository};
use crate::utils::error::StorageResult;
use crate::utils::{format_date, parse_date};

/// Trailing window of history shown on a project page
pub const HISTORY_WINDOW_MONTHS: u32 = 3;

/// `?date=YYYY-MM-DD&page=N&per_page=M`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// One page of snapshots for a collection date
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectPage {
    pub date: String,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
    pub projects: Vec<ProjectSnapshot>,
    pub error: Option<String>,
}

impl ProjectPage {
    fn empty(date: String, per_page: u64, error: String) -> Self {
        Self {
            date,
            page: 1,
            per_page,
            total_items: 0,
            total_pages: 1,
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Snapshot plus trailing history of one project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: ProjectSnapshot,
    pub history: Vec<HistoryRecord>,
    pub since: NaiveDateTime,
}

/// Resolve the requested date, defaulting to today
fn resolve_date(raw: Option<&str>) -> Result<NaiveDate, String> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(Local::now().date_naive()),
        Some(value) => parse_date(value)
            .ok_or_else(|| format!("Invalid date '{value}', expected YYYY-MM-DD")),
    }
}

/// Load a page of snapshots for the requested date
///
/// The page number is clamped into `1..=total_pages`.
pub async fn load_project_page(repo: &SharedProjectRepository, query: &ListQuery) -> ProjectPage {
    let per_page = query
        .per_page
        .unwrap_or(Pagination::DEFAULT_PER_PAGE)
        .clamp(1, Pagination::MAX_PER_PAGE);

    let date = match resolve_date(query.date.as_deref()) {
        Ok(date) => date,
        Err(message) => {
            let raw = query.date.clone().unwrap_or_default();
            return ProjectPage::empty(raw, per_page, message);
        }
    };

    let requested_page = query.page.unwrap_or(1);
    let result: StorageResult<(Pagination, Vec<ProjectSnapshot>)> =
        run_blocking(repo, move |repo| {
            let total = repo.count_snapshots_on(date)?;
            let pagination = Pagination::new(total, requested_page, per_page);
            let projects =
                repo.list_snapshots_on(date, pagination.per_page, pagination.offset())?;
            Ok((pagination, projects))
        })
        .await;

    match result {
        Ok((pagination, projects)) => ProjectPage {
            date: format_date(date),
            page: pagination.page,
            per_page: pagination.per_page,
            total_items: pagination.total_items,
            total_pages: pagination.total_pages,
            prev_page: pagination.has_prev().then(|| pagination.page - 1),
            next_page: pagination.has_next().then(|| pagination.page + 1),
            projects,
            error: None,
        },
        Err(e) => {
            tracing::warn!(%date, error = %e, "Project listing failed");
            ProjectPage::empty(format_date(date), per_page, format!("Query failed: {e}"))
        }
    }
}

/// Load a project and its history over the trailing window
pub async fn load_project_detail(
    repo: &SharedProjectRepository,
    project_id: i64,
) -> StorageResult<Option<ProjectDetail>> {
    let now = Utc::now().naive_utc();
    let since = now
        .checked_sub_months(Months::new(HISTORY_WINDOW_MONTHS))
        .unwrap_or(now);

    run_blocking(repo, move |repo| {
        let Some(project) = repo.get_snapshot(project_id)? else {
            return Ok(None);
        };
        let history = repo.history_since(project_id, since)?;
        Ok(Some(ProjectDetail {
            project,
            history,
            since,
        }))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metrics;
    use crate::storage::{MockProjectRepository, ProjectRepository};
    use chrono::Duration;
    use std::sync::Arc;

    fn snapshot(id: i64, stars: u64, date: NaiveDate) -> ProjectSnapshot {
        ProjectSnapshot {
            project_id: id,
            repo_id: format!("o/r{id}"),
            name: format!("r{id}"),
            full_name: format!("o/r{id}"),
            description: None,
            url: format!("https://github.com/o/r{id}"),
            language: None,
            collect_date: date,
            stars,
            forks: 0,
            watchers: 0,
        }
    }

    fn repo_with(count: i64, date: NaiveDate) -> SharedProjectRepository {
        let repo = MockProjectRepository::new();
        for id in 1..=count {
            repo.upsert_snapshot(&snapshot(id, id as u64 * 10, date)).unwrap();
        }
        Arc::new(repo)
    }

    fn query(date: &str, page: u64, per_page: u64) -> ListQuery {
        ListQuery {
            date: Some(date.to_string()),
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    #[tokio::test]
    async fn test_page_is_clamped() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let repo = repo_with(45, date);

        let page = load_project_page(&repo, &query("2024-05-01", 99, 20)).await;
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.projects.len(), 5);
        assert_eq!(page.prev_page, Some(2));
        assert_eq!(page.next_page, None);
        assert!(page.error.is_none());
    }

    #[tokio::test]
    async fn test_stars_descending() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let repo = repo_with(5, date);

        let page = load_project_page(&repo, &query("2024-05-01", 1, 2)).await;
        let stars: Vec<u64> = page.projects.iter().map(|p| p.stars).collect();
        assert_eq!(stars, vec![50, 40]);
        assert_eq!(page.next_page, Some(2));
    }

    #[tokio::test]
    async fn test_invalid_date_yields_message() {
        let repo = repo_with(3, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());

        let page = load_project_page(&repo, &query("May 1st", 1, 20)).await;
        assert!(page.projects.is_empty());
        assert!(page.error.unwrap().contains("May 1st"));
    }

    #[tokio::test]
    async fn test_defaults_to_today() {
        let repo = repo_with(2, Local::now().date_naive());

        let page = load_project_page(&repo, &ListQuery::default()).await;
        assert_eq!(page.per_page, Pagination::DEFAULT_PER_PAGE);
        assert_eq!(page.total_items, 2);
        assert_eq!(page.date, format_date(Local::now().date_naive()));
    }

    #[tokio::test]
    async fn test_per_page_capped() {
        let repo = repo_with(1, Local::now().date_naive());
        let page = load_project_page(
            &repo,
            &ListQuery {
                per_page: Some(10_000),
                ..ListQuery::default()
            },
        )
        .await;
        assert_eq!(page.per_page, Pagination::MAX_PER_PAGE);
    }

    #[tokio::test]
    async fn test_detail_keeps_trailing_window() {
        let repo = repo_with(1, Local::now().date_naive());
        let now = Utc::now().naive_utc();
        let metrics = Metrics {
            stars: 1,
            forks: 0,
            watchers: 0,
        };
        repo.append_history(1, metrics, now - Duration::days(200)).unwrap();
        repo.append_history(1, metrics, now - Duration::days(10)).unwrap();
        repo.append_history(1, metrics, now - Duration::days(1)).unwrap();

        let detail = load_project_detail(&repo, 1).await.unwrap().unwrap();
        assert_eq!(detail.project.project_id, 1);
        assert_eq!(detail.history.len(), 2);
        assert!(detail.history[0].collect_date < detail.history[1].collect_date);

        assert!(load_project_detail(&repo, 404).await.unwrap().is_none());
    }
}
