//! Daily job runner with per-job run locks

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;
use uuid::Uuid;

use super::error::{SchedulerError, SchedulerResult};
use super::job::{DailyTime, JobKind, JobOutput, JobStatus, ManualRunReport, RunSummary, Trigger};
use crate::collector::{CollectReport, Collector, HistorySweep};
use crate::config::SchedulerConfig;

/// Pause before re-planning when no next occurrence could be computed
const REPLAN_DELAY: Duration = Duration::from_secs(3600);

/// One registered job and its run state
struct ScheduledJob {
    kind: JobKind,
    time: DailyTime,

    /// Held for the whole run; `try_lock_owned` makes runs non-reentrant
    lock: Arc<tokio::sync::Mutex<()>>,

    status: Mutex<JobStatus>,
}

impl ScheduledJob {
    fn new(kind: JobKind, time: DailyTime) -> Self {
        Self {
            kind,
            time,
            lock: Arc::new(tokio::sync::Mutex::new(())),
            status: Mutex::new(JobStatus::new(kind, time)),
        }
    }

    fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    fn status(&self) -> JobStatus {
        let mut status = match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        status.running = self.is_running();
        status
    }

    fn update_status(&self, f: impl FnOnce(&mut JobStatus)) {
        match self.status.lock() {
            Ok(mut status) => f(&mut status),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

/// Owns the daily schedule of the two collection jobs
///
/// Created once at process start; [`CollectionScheduler::shutdown`] stops the
/// job loops and cancels a running history sweep.
pub struct CollectionScheduler {
    collector: Arc<Collector>,
    jobs: Vec<Arc<ScheduledJob>>,
    run_on_startup: bool,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CollectionScheduler {
    /// Register `collect` and `update_history` at their configured times
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidTime` for an unparseable time.
    pub fn new(collector: Arc<Collector>, config: &SchedulerConfig) -> SchedulerResult<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let mut scheduler = Self {
            collector,
            jobs: Vec::new(),
            run_on_startup: config.run_on_startup,
            started: AtomicBool::new(false),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        };

        scheduler.register(JobKind::Collect, &config.collect_time)?;
        scheduler.register(JobKind::UpdateHistory, &config.history_time)?;
        Ok(scheduler)
    }

    fn register(&mut self, kind: JobKind, time: &str) -> SchedulerResult<()> {
        if self.jobs.iter().any(|job| job.kind == kind) {
            return Err(SchedulerError::DuplicateJob {
                job: kind.name().to_string(),
            });
        }

        let time = DailyTime::parse(kind, time)?;
        tracing::info!(job = kind.name(), %time, "Job registered");
        self.jobs.push(Arc::new(ScheduledJob::new(kind, time)));
        Ok(())
    }

    fn job(&self, kind: JobKind) -> SchedulerResult<&Arc<ScheduledJob>> {
        self.jobs
            .iter()
            .find(|job| job.kind == kind)
            .ok_or_else(|| SchedulerError::UnknownJob {
                job: kind.name().to_string(),
            })
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Spawn one background loop per job
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyStarted` on a second call.
    pub fn start(&self) -> SchedulerResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let mut spawned = Vec::with_capacity(self.jobs.len() + 1);
        for job in &self.jobs {
            spawned.push(tokio::spawn(run_schedule(
                Arc::clone(job),
                Arc::clone(&self.collector),
                self.shutdown_tx.subscribe(),
            )));
        }

        if self.run_on_startup {
            let jobs = self.jobs.clone();
            let collector = Arc::clone(&self.collector);
            let shutdown = self.shutdown_tx.subscribe();
            spawned.push(tokio::spawn(async move {
                for job in &jobs {
                    if *shutdown.borrow() {
                        tracing::info!(
                            job = job.kind.name(),
                            "Shutdown requested, skipping startup run"
                        );
                        break;
                    }
                    if let Err(e) = run_kind(job, &collector, Trigger::Startup).await {
                        tracing::warn!(job = job.kind.name(), error = %e, "Startup run failed");
                    }
                }
            }));
        }

        match self.handles.lock() {
            Ok(mut handles) => handles.extend(spawned),
            Err(poisoned) => poisoned.into_inner().extend(spawned),
        }

        tracing::info!(jobs = self.jobs.len(), "Scheduler started");
        Ok(())
    }

    /// Stop all job loops, halt the collector and wait for the tasks
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotStarted` if `start` was never called.
    pub async fn shutdown(&self) -> SchedulerResult<()> {
        if !self.is_started() {
            return Err(SchedulerError::NotStarted);
        }

        tracing::info!("Scheduler shutting down");
        self.shutdown_tx.send_replace(true);
        self.collector.halt();

        let handles: Vec<JoinHandle<()>> = match self.handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Scheduler task ended abnormally");
            }
        }

        tracing::info!("Scheduler stopped");
        Ok(())
    }

    /// Current status of every job, in registration order
    pub fn status(&self) -> Vec<JobStatus> {
        self.jobs.iter().map(|job| job.status()).collect()
    }

    /// Run one job now
    ///
    /// # Errors
    ///
    /// `JobAlreadyRunning` if the job is busy, `JobPanicked` if the run panicked.
    pub async fn run_job(&self, kind: JobKind) -> SchedulerResult<JobOutput> {
        run_kind(self.job(kind)?, &self.collector, Trigger::Manual).await
    }

    /// Run collect, then history, in sequence
    ///
    /// Refuses to start if either job is already running.
    pub async fn trigger_manual_collection(&self) -> SchedulerResult<ManualRunReport> {
        if let Some(busy) = self.jobs.iter().find(|job| job.is_running()) {
            return Err(SchedulerError::JobAlreadyRunning {
                job: busy.kind.name().to_string(),
            });
        }

        tracing::info!("Manual collection triggered");

        let collect = run_collect(self.job(JobKind::Collect)?, &self.collector, Trigger::Manual).await?;
        let history =
            run_history(self.job(JobKind::UpdateHistory)?, &self.collector, Trigger::Manual)
                .await?;

        Ok(ManualRunReport { collect, history })
    }
}

/// Sleep until each daily occurrence and run the job, until shutdown
async fn run_schedule(
    job: Arc<ScheduledJob>,
    collector: Arc<Collector>,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = job.kind.name();

    loop {
        let now = Local::now();
        let (wait, due) = match job.time.next_after(&now) {
            Some(next) => {
                tracing::info!(job = name, next_run = %next, "Next run scheduled");
                ((next - now).to_std().unwrap_or(Duration::ZERO), true)
            }
            None => {
                tracing::warn!(job = name, "No upcoming occurrence, re-planning later");
                (REPLAN_DELAY, false)
            }
        };

        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            _ = tokio::time::sleep(wait) => {}
        }

        if !due {
            continue;
        }
        if *shutdown.borrow() {
            break;
        }

        match run_kind(&job, &collector, Trigger::Scheduled).await {
            Ok(_) => {}
            Err(SchedulerError::JobAlreadyRunning { .. }) => {
                tracing::warn!(job = name, "Previous run still in progress, skipping");
            }
            Err(e) => {
                tracing::error!(job = name, error = %e, "Scheduled run failed");
            }
        }
    }

    tracing::debug!(job = name, "Job loop stopped");
}

async fn run_kind(
    job: &ScheduledJob,
    collector: &Arc<Collector>,
    trigger: Trigger,
) -> SchedulerResult<JobOutput> {
    match job.kind {
        JobKind::Collect => run_collect(job, collector, trigger)
            .await
            .map(JobOutput::Collect),
        JobKind::UpdateHistory => run_history(job, collector, trigger)
            .await
            .map(JobOutput::UpdateHistory),
    }
}

async fn run_collect(
    job: &ScheduledJob,
    collector: &Arc<Collector>,
    trigger: Trigger,
) -> SchedulerResult<CollectReport> {
    let collector = Arc::clone(collector);
    execute(job, trigger, async move { collector.collect_trending_repos().await }).await
}

async fn run_history(
    job: &ScheduledJob,
    collector: &Arc<Collector>,
    trigger: Trigger,
) -> SchedulerResult<HistorySweep> {
    let collector = Arc::clone(collector);
    execute(job, trigger, async move { collector.update_history().await }).await
}

/// Run `work` under the job lock in a separate task
///
/// The task boundary turns a panic into `SchedulerError::JobPanicked`.
async fn execute<T, Fut>(job: &ScheduledJob, trigger: Trigger, work: Fut) -> SchedulerResult<T>
where
    Fut: Future<Output = T> + Send + 'static,
    T: RunSummary + Send + 'static,
{
    let name = job.kind.name();
    let guard = Arc::clone(&job.lock)
        .try_lock_owned()
        .map_err(|_| SchedulerError::JobAlreadyRunning {
            job: name.to_string(),
        })?;

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("job", job = name, %run_id, trigger = trigger.as_str());

    job.update_status(|s| s.last_started = Some(Utc::now()));
    crate::metrics::set_job_running(name, true);
    let timer = crate::metrics::start_job_timer(name);

    let handle = tokio::spawn(
        async move {
            // Released when the task ends, even by panic
            let _guard = guard;
            tracing::info!("Job run started");
            work.await
        }
        .instrument(span.clone()),
    );

    let result = handle.await.map_err(|e| SchedulerError::JobPanicked {
        job: name.to_string(),
        reason: panic_reason(e),
    });
    drop(timer);

    let last_result = match &result {
        Ok(output) => output.summary(),
        Err(e) => e.to_string(),
    };
    span.in_scope(|| match &result {
        Ok(_) => tracing::info!(result = %last_result, "Job run finished"),
        Err(_) => tracing::error!(error = %last_result, "Job run aborted"),
    });

    job.update_status(|s| {
        s.last_finished = Some(Utc::now());
        s.last_result = Some(last_result);
        s.runs += 1;
    });
    crate::metrics::set_job_running(name, false);
    crate::metrics::record_job_run(name, trigger.as_str(), result.is_ok());

    result
}

fn panic_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
