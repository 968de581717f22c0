//! Daily scheduling of the collection jobs
//!
//! Two named jobs run once a day at fixed local times:
//!
//! | Job              | Default | Operation                               |
//! |------------------|---------|-----------------------------------------|
//! | `collect`        | 02:00   | [`Collector::collect_trending_repos`]   |
//! | `update_history` | 03:00   | [`Collector::update_history`]           |
//!
//! Each job has its own non-reentrant run lock. A scheduled run that finds
//! its job busy is skipped; a manual run gets
//! [`SchedulerError::JobAlreadyRunning`]. Missed runs are not persisted: a
//! run scheduled while the process was down is simply lost.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use startrail::scheduler::CollectionScheduler;
//!
//! let scheduler = CollectionScheduler::new(Arc::clone(&collector), &config.scheduler)?;
//! scheduler.start()?;
//!
//! // ... serve requests ...
//!
//! scheduler.shutdown().await?;
//! ```
//!
//! [`Collector::collect_trending_repos`]: crate::collector::Collector::collect_trending_repos
//! [`Collector::update_history`]: crate::collector::Collector::update_history

pub mod error;
pub mod job;
pub mod runner;

pub use error::{SchedulerError, SchedulerResult};
pub use job::{DailyTime, JobKind, JobOutput, JobStatus, ManualRunReport, RunSummary, Trigger};
pub use runner::CollectionScheduler;
