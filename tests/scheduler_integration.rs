//! Scheduler driving a real collector, SQLite file and mock API

mod common;

use std::sync::Arc;
use std::time::Duration;

use startrail::collector::Collector;
use startrail::config::{CollectorConfig, SchedulerConfig};
use startrail::github::GithubClient;
use startrail::scheduler::{CollectionScheduler, JobKind, JobOutput, SchedulerError};
use startrail::storage::{create_sqlite_repository, ProjectRepository, SqliteProjectRepository};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    _dir: TempDir,
    server: MockServer,
    repo: Arc<SqliteProjectRepository>,
    scheduler: Arc<CollectionScheduler>,
}

async fn harness(detail_delay: Duration) -> Harness {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::search_json(&[(1, 500), (2, 400), (3, 300)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/repositories/\d+$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::repo_json(1, 600))
                .set_delay(detail_delay),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let repo = create_sqlite_repository(dir.path().join("github.db")).unwrap();
    let api = Arc::new(GithubClient::with_base_url(&server.uri(), Duration::ZERO).unwrap());
    let collector = Arc::new(Collector::new(
        api,
        repo.clone(),
        CollectorConfig::default(),
    ));
    let scheduler =
        Arc::new(CollectionScheduler::new(collector, &SchedulerConfig::default()).unwrap());

    Harness {
        _dir: dir,
        server,
        repo,
        scheduler,
    }
}

async fn wait_until_running(scheduler: &CollectionScheduler, kind: JobKind) {
    for _ in 0..200 {
        if scheduler.status().iter().any(|s| s.job == kind && s.running) {
            // Let the run get past its setup
            tokio::time::sleep(Duration::from_millis(50)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{kind} never started");
}

#[tokio::test]
async fn test_manual_collection_runs_both_jobs() {
    let h = harness(Duration::ZERO).await;

    let report = h.scheduler.trigger_manual_collection().await.unwrap();

    assert_eq!(report.collect.succeeded(), 3);
    assert_eq!(report.history.succeeded(), 3);
    assert_eq!(h.repo.count_projects().unwrap(), 3);
    assert_eq!(h.repo.count_history().unwrap(), 3);

    for status in h.scheduler.status() {
        assert_eq!(status.runs, 1);
        assert!(!status.running);
        assert!(status.last_finished.is_some());
    }
}

#[tokio::test]
async fn test_single_job_run() {
    let h = harness(Duration::ZERO).await;

    let output = h.scheduler.run_job(JobKind::Collect).await.unwrap();
    let JobOutput::Collect(report) = output else {
        panic!("expected a collect report");
    };
    assert_eq!(report.project_ids(), vec![1, 2, 3]);
    assert_eq!(h.repo.count_history().unwrap(), 0);
}

#[tokio::test]
async fn test_busy_job_rejects_manual_run() {
    let h = harness(Duration::from_millis(300)).await;
    h.scheduler.run_job(JobKind::Collect).await.unwrap();

    let background = {
        let scheduler = Arc::clone(&h.scheduler);
        tokio::spawn(async move { scheduler.run_job(JobKind::UpdateHistory).await })
    };
    wait_until_running(&h.scheduler, JobKind::UpdateHistory).await;

    let err = h.scheduler.trigger_manual_collection().await.unwrap_err();
    assert_eq!(
        err,
        SchedulerError::JobAlreadyRunning {
            job: "update_history".to_string()
        }
    );

    // The other job is free
    assert!(h.scheduler.run_job(JobKind::Collect).await.is_ok());

    h.scheduler.collector().cancel_sweep();
    let output = background.await.unwrap().unwrap();
    let JobOutput::UpdateHistory(sweep) = output else {
        panic!("expected a history sweep");
    };
    assert!(sweep.cancelled);
    assert!(sweep.visited() < 3);
}

#[tokio::test]
async fn test_shutdown_cancels_running_sweep() {
    let h = harness(Duration::from_millis(300)).await;
    h.scheduler.run_job(JobKind::Collect).await.unwrap();
    h.scheduler.start().unwrap();

    let background = {
        let scheduler = Arc::clone(&h.scheduler);
        tokio::spawn(async move { scheduler.run_job(JobKind::UpdateHistory).await })
    };
    wait_until_running(&h.scheduler, JobKind::UpdateHistory).await;

    tokio::time::timeout(Duration::from_secs(5), h.scheduler.shutdown())
        .await
        .unwrap()
        .unwrap();

    let output = background.await.unwrap().unwrap();
    let JobOutput::UpdateHistory(sweep) = output else {
        panic!("expected a history sweep");
    };
    assert!(sweep.cancelled);
    drop(h.server);
}
