//! Prometheus metrics for the collector and its scheduler
//!
//! This module provides metrics tracking for:
//! - Hosting API: request counts by endpoint and status, latency, rate-limit headroom
//! - Collector: per-item outcomes, run durations, tracked project count
//! - Scheduler: job runs by result, running flags
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    CounterVec, Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for outbound API metrics
struct ApiMetrics {
    requests: CounterVec,
    duration: HistogramVec,
    rate_limit_remaining: Gauge,
}

/// Container for collection metrics
struct CollectorMetrics {
    items: CounterVec,
    run_duration: HistogramVec,
    job_runs: CounterVec,
    job_running: GaugeVec,
    last_run_timestamp: GaugeVec,
    tracked_projects: Gauge,
}

/// Global storage for API metrics
static API_METRICS: OnceLock<ApiMetrics> = OnceLock::new();

/// Global storage for collector metrics
static COLLECTOR_METRICS: OnceLock<CollectorMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, errors are logged and subsequent
/// metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = startrail::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let api = ApiMetrics {
        requests: register_counter_vec!(
            "startrail_api_requests_total",
            "Total hosting API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        duration: register_histogram_vec!(
            "startrail_api_request_duration_seconds",
            "Hosting API request duration in seconds",
            &["endpoint"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        )?,
        rate_limit_remaining: register_gauge!(
            "startrail_api_rate_limit_remaining",
            "Last observed X-RateLimit-Remaining value"
        )?,
    };

    let collector = CollectorMetrics {
        items: register_counter_vec!(
            "startrail_collector_items_total",
            "Per-project outcomes by job",
            &["job", "outcome"]
        )?,
        run_duration: register_histogram_vec!(
            "startrail_job_duration_seconds",
            "Job run duration in seconds",
            &["job"],
            vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0]
        )?,
        job_runs: register_counter_vec!(
            "startrail_job_runs_total",
            "Job runs by trigger and result",
            &["job", "trigger", "result"]
        )?,
        job_running: register_gauge_vec!(
            "startrail_job_running",
            "Whether the job is currently running (1 = yes, 0 = no)",
            &["job"]
        )?,
        last_run_timestamp: register_gauge_vec!(
            "startrail_job_last_run_timestamp_seconds",
            "Unix time the job last finished",
            &["job"]
        )?,
        tracked_projects: register_gauge!(
            "startrail_tracked_projects",
            "Snapshot rows seen at the start of the last history sweep"
        )?,
    };

    API_METRICS
        .set(api)
        .map_err(|_| "API metrics already initialized")?;
    COLLECTOR_METRICS
        .set(collector)
        .map_err(|_| "Collector metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    API_METRICS.get().is_some() && COLLECTOR_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one hosting API call; `status` 0 means no response was received
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = API_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// Update the rate-limit headroom gauge
pub fn set_rate_limit_remaining(remaining: u64) {
    if let Some(m) = API_METRICS.get() {
        m.rate_limit_remaining.set(remaining as f64);
    }
}

/// Record a per-project outcome (`stored`, `transport_failed`, `storage_failed`)
pub fn record_item_outcome(job: &str, outcome: &str) {
    if let Some(m) = COLLECTOR_METRICS.get() {
        m.items.with_label_values(&[job, outcome]).inc();
    }
}

/// Update the tracked project gauge
pub fn set_tracked_projects(count: u64) {
    if let Some(m) = COLLECTOR_METRICS.get() {
        m.tracked_projects.set(count as f64);
    }
}

/// Record a finished job run
pub fn record_job_run(job: &str, trigger: &str, success: bool) {
    let Some(m) = COLLECTOR_METRICS.get() else {
        return;
    };

    let result = if success { "success" } else { "failure" };
    m.job_runs.with_label_values(&[job, trigger, result]).inc();
    m.last_run_timestamp
        .with_label_values(&[job])
        .set(chrono::Utc::now().timestamp() as f64);
}

/// Flip the running flag for a job
pub fn set_job_running(job: &str, running: bool) {
    if let Some(m) = COLLECTOR_METRICS.get() {
        m.job_running
            .with_label_values(&[job])
            .set(if running { 1.0 } else { 0.0 });
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a job duration timer
pub fn start_job_timer(job: &str) -> MetricsTimer {
    match COLLECTOR_METRICS.get() {
        Some(m) => MetricsTimer::new(m.run_duration.with_label_values(&[job]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
