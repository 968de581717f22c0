//! Job definitions, daily times and run status

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};
use crate::collector::{CollectReport, HistorySweep, COLLECT_JOB, HISTORY_JOB};
use crate::config::TIME_FORMAT;

/// The two collection jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Collect,
    UpdateHistory,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Collect => COLLECT_JOB,
            Self::UpdateHistory => HISTORY_JOB,
        }
    }

    /// All jobs in manual-run order
    pub fn all() -> [JobKind; 2] {
        [Self::Collect, Self::UpdateHistory]
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
    Startup,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
            Self::Startup => "startup",
        }
    }
}

/// A wall-clock time of day, `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime(NaiveTime);

impl DailyTime {
    pub fn parse(job: JobKind, value: &str) -> SchedulerResult<Self> {
        NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
            .map(Self)
            .map_err(|_| SchedulerError::InvalidTime {
                job: job.name().to_string(),
                value: value.to_string(),
            })
    }

    /// First occurrence strictly after `now` in `now`'s time zone
    ///
    /// A day where the time falls in a DST gap is skipped; an ambiguous
    /// time resolves to its earlier instant.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let today = now.date_naive();

        (0..=2u64)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter_map(|day| tz.from_local_datetime(&day.and_time(self.0)).earliest())
            .find(|candidate| candidate > now)
    }
}

impl std::fmt::Display for DailyTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIME_FORMAT))
    }
}

/// Output of a finished run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobOutput {
    Collect(CollectReport),
    UpdateHistory(HistorySweep),
}

/// One-line outcome of a run, kept in [`JobStatus::last_result`]
pub trait RunSummary {
    fn summary(&self) -> String;
}

impl RunSummary for CollectReport {
    fn summary(&self) -> String {
        CollectReport::summary(self)
    }
}

impl RunSummary for HistorySweep {
    fn summary(&self) -> String {
        HistorySweep::summary(self)
    }
}

impl RunSummary for JobOutput {
    fn summary(&self) -> String {
        match self {
            Self::Collect(report) => report.summary(),
            Self::UpdateHistory(sweep) => sweep.summary(),
        }
    }
}

/// Point-in-time view of one job
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job: JobKind,
    /// Daily time, `HH:MM` local
    pub time: String,
    pub running: bool,
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_result: Option<String>,
    /// Finished runs since start, any outcome
    pub runs: u64,
}

impl JobStatus {
    pub(crate) fn new(job: JobKind, time: DailyTime) -> Self {
        Self {
            job,
            time: time.to_string(),
            running: false,
            last_started: None,
            last_finished: None,
            last_result: None,
            runs: 0,
        }
    }
}

/// Reports from a manual collect-then-history run
#[derive(Debug, Clone, Serialize)]
pub struct ManualRunReport {
    pub collect: CollectReport,
    pub history: HistorySweep,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_parse_daily_time() {
        let t = DailyTime::parse(JobKind::Collect, "02:00").unwrap();
        assert_eq!(t.to_string(), "02:00");

        let err = DailyTime::parse(JobKind::UpdateHistory, "3am").unwrap_err();
        assert_eq!(
            err,
            SchedulerError::InvalidTime {
                job: "update_history".to_string(),
                value: "3am".to_string()
            }
        );
        assert!(DailyTime::parse(JobKind::Collect, "24:00").is_err());
    }

    #[test]
    fn test_next_after_later_today() {
        let t = DailyTime::parse(JobKind::Collect, "02:00").unwrap();
        let next = t.next_after(&utc(2024, 6, 1, 1, 30)).unwrap();
        assert_eq!(next, utc(2024, 6, 1, 2, 0));
    }

    #[test]
    fn test_next_after_rolls_to_tomorrow() {
        let t = DailyTime::parse(JobKind::Collect, "02:00").unwrap();
        assert_eq!(
            t.next_after(&utc(2024, 6, 1, 2, 0)).unwrap(),
            utc(2024, 6, 2, 2, 0)
        );
        assert_eq!(
            t.next_after(&utc(2024, 12, 31, 23, 0)).unwrap(),
            utc(2025, 1, 1, 2, 0)
        );
    }

    #[test]
    fn test_next_after_respects_offset() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap();
        let t = DailyTime::parse(JobKind::UpdateHistory, "03:00").unwrap();

        let next = t.next_after(&now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2024, 6, 2, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_job_names() {
        assert_eq!(JobKind::Collect.name(), "collect");
        assert_eq!(JobKind::UpdateHistory.to_string(), "update_history");
        assert_eq!(JobKind::all(), [JobKind::Collect, JobKind::UpdateHistory]);
    }

    #[test]
    fn test_history_summary_marks_cancelled() {
        let output = JobOutput::UpdateHistory(HistorySweep {
            total_pages: 3,
            cancelled: true,
            ..HistorySweep::default()
        });
        assert!(output.summary().ends_with("cancelled"));
    }
}
