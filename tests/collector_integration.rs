//! End-to-end collection against a mock API and an on-disk SQLite file

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use startrail::collector::{Collector, ItemOutcome};
use startrail::config::CollectorConfig;
use startrail::github::GithubClient;
use startrail::models::ProjectSnapshot;
use startrail::storage::{
    create_sqlite_repository, ProjectRepository, SharedProjectRepository, SqliteProjectRepository,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collector_config(history_page_size: u64) -> CollectorConfig {
    CollectorConfig {
        min_stars: 1000,
        search_page_size: 100,
        history_page_size,
        verify_project_exists: false,
    }
}

fn setup(server: &MockServer, dir: &TempDir, page_size: u64) -> (Collector, Arc<SqliteProjectRepository>) {
    let repo = create_sqlite_repository(dir.path().join("data").join("github.db")).unwrap();
    let api = Arc::new(GithubClient::with_base_url(&server.uri(), Duration::ZERO).unwrap());
    let shared: SharedProjectRepository = repo.clone();
    (Collector::new(api, shared, collector_config(page_size)), repo)
}

fn since_2000() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

async fn mount_detail(server: &MockServer, id: i64, stars: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/repositories/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::repo_json(id, stars)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_collect_then_history() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (collector, repo) = setup(&server, &dir, 100);

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::search_json(&[(1, 500), (2, 400), (3, 300)])),
        )
        .mount(&server)
        .await;
    for (id, stars) in [(1, 510), (2, 420), (3, 330)] {
        mount_detail(&server, id, stars).await;
    }

    let report = collector.collect_trending_repos().await;
    assert!(report.search_error.is_none());
    assert_eq!(report.project_ids(), vec![1, 2, 3]);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.run_date, Local::now().date_naive());

    assert_eq!(repo.count_projects().unwrap(), 3);
    let snapshot = repo.get_snapshot(2).unwrap().unwrap();
    assert_eq!(snapshot.repo_id, "owner/repo2");
    assert_eq!(snapshot.stars, 400);

    let sweep = collector.update_history().await;
    assert_eq!(sweep.total_pages, 1);
    assert_eq!(sweep.succeeded(), 3);
    assert!(!sweep.cancelled);
    assert_eq!(repo.count_history().unwrap(), 3);

    let history = repo
        .history_since(3, since_2000())
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stars, 330);
}

#[tokio::test]
async fn test_recollect_replaces_snapshots() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (collector, repo) = setup(&server, &dir, 100);

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::search_json(&[(1, 500), (2, 400)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::search_json(&[(1, 900)])),
        )
        .mount(&server)
        .await;

    collector.collect_trending_repos().await;
    collector.collect_trending_repos().await;

    assert_eq!(repo.count_projects().unwrap(), 2);
    assert_eq!(repo.get_snapshot(1).unwrap().unwrap().stars, 900);
    assert_eq!(repo.get_snapshot(2).unwrap().unwrap().stars, 400);
}

#[tokio::test]
async fn test_search_failure_collects_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (collector, repo) = setup(&server, &dir, 100);

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let report = collector.collect_trending_repos().await;
    assert!(report.search_error.is_some());
    assert!(report.projects.is_empty());
    assert_eq!(repo.count_projects().unwrap(), 0);
}

#[tokio::test]
async fn test_history_sweep_pages_through_every_project() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (collector, repo) = setup(&server, &dir, 100);

    let today = Local::now().date_naive();
    for id in 1..=250 {
        let snapshot = ProjectSnapshot::from_summary(&common::summary(id, 1000 + id as u64), today);
        repo.upsert_snapshot(&snapshot).unwrap();
    }

    Mock::given(method("GET"))
        .and(path_regex(r"^/repositories/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::repo_json(1, 77)))
        .expect(250)
        .mount(&server)
        .await;

    let sweep = collector.update_history().await;

    assert_eq!(sweep.total_projects, 250);
    assert_eq!(sweep.total_pages, 3);
    let sizes: Vec<usize> = sweep.pages.iter().map(|p| p.outcomes.len()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(sweep.succeeded(), 250);
    assert_eq!(repo.count_history().unwrap(), 250);

    // Rows land under the requested id, not the id in the body
    let rows = repo.history_since(250, since_2000()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].stars, 77);
}

#[tokio::test]
async fn test_detail_failure_is_isolated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (collector, repo) = setup(&server, &dir, 2);

    let today = Local::now().date_naive();
    for id in 1..=3 {
        repo.upsert_snapshot(&ProjectSnapshot::from_summary(&common::summary(id, 100), today))
            .unwrap();
    }

    mount_detail(&server, 1, 101).await;
    Mock::given(method("GET"))
        .and(path("/repositories/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_detail(&server, 3, 103).await;

    let sweep = collector.update_history().await;

    assert_eq!(sweep.total_pages, 2);
    assert_eq!(sweep.succeeded(), 2);
    assert_eq!(sweep.failed(), 1);
    let failed: Vec<i64> = sweep
        .outcomes()
        .filter(|(_, o)| matches!(o, ItemOutcome::TransportFailed(_)))
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(failed, vec![2]);

    assert_eq!(repo.count_history().unwrap(), 2);
    assert!(repo
        .history_since(2, since_2000())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_repeated_sweeps_append() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (collector, repo) = setup(&server, &dir, 100);

    repo.upsert_snapshot(&ProjectSnapshot::from_summary(
        &common::summary(1, 100),
        Local::now().date_naive(),
    ))
    .unwrap();
    mount_detail(&server, 1, 100).await;

    collector.update_history().await;
    collector.update_history().await;

    assert_eq!(repo.count_history().unwrap(), 2);
}
