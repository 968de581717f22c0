//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Daily time could not be parsed as `HH:MM`
    InvalidTime {
        job: String,
        value: String,
    },

    /// Two jobs registered under one name
    DuplicateJob {
        job: String,
    },

    /// No job registered under this name
    UnknownJob {
        job: String,
    },

    /// `start()` called twice
    AlreadyStarted,

    /// Operation requires a started scheduler
    NotStarted,

    /// Manual run requested while the job is running
    JobAlreadyRunning {
        job: String,
    },

    /// A job run panicked
    JobPanicked {
        job: String,
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTime { job, value } => {
                write!(f, "Invalid time '{}' for job '{}'. Expected HH:MM", value, job)
            }
            Self::DuplicateJob { job } => {
                write!(f, "Job '{}' is already registered", job)
            }
            Self::UnknownJob { job } => {
                write!(f, "Unknown job '{}'", job)
            }
            Self::AlreadyStarted => write!(f, "Scheduler already started"),
            Self::NotStarted => write!(f, "Scheduler not started"),
            Self::JobAlreadyRunning { job } => {
                write!(f, "Job '{}' is already running", job)
            }
            Self::JobPanicked { job, reason } => {
                write!(f, "Job '{}' panicked: {}", job, reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Check if the caller may simply try again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::JobAlreadyRunning { .. } | Self::JobPanicked { .. })
    }
}
