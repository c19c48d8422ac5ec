//! Prometheus metrics for leaderboard-service
//!
//! Tracks job executions, synthesized events, retention sweeps and provider calls

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, HistogramVec, IntCounter, IntCounterVec,
    Registry, TextEncoder,
};

lazy_static! {
    /// Registry exposed on /metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total job executions (labels: job_name, status=success|error)
    pub static ref JOB_RUNS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "leaderboard_job_runs_total",
        "Total number of job executions",
        &["job_name", "status"],
        REGISTRY
    )
    .expect("Prometheus metrics registration should succeed at startup");

    /// Job execution duration in seconds (labels: job_name)
    pub static ref JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec_with_registry!(
        "leaderboard_job_duration_seconds",
        "Time spent executing jobs",
        &["job_name"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        REGISTRY
    )
    .expect("Prometheus metrics registration should succeed at startup");

    /// Aggregate follow/unfollow events written by ingestion
    pub static ref FOLLOW_EVENTS_CREATED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "leaderboard_follow_events_created_total",
        "Total number of synthesized follow events",
        REGISTRY
    )
    .expect("Prometheus metrics registration should succeed at startup");

    /// Rows removed by the retention sweep (labels: table)
    pub static ref RETENTION_ROWS_DELETED_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "leaderboard_retention_rows_deleted_total",
        "Total number of rows deleted by retention",
        &["table"],
        REGISTRY
    )
    .expect("Prometheus metrics registration should succeed at startup");

    /// Social-graph provider calls (labels: endpoint, status=success|error)
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "leaderboard_provider_requests_total",
        "Total number of social-graph provider requests",
        &["endpoint", "status"],
        REGISTRY
    )
    .expect("Prometheus metrics registration should succeed at startup");
}

pub fn record_provider_request(endpoint: &str, ok: bool) {
    let status = if ok { "success" } else { "error" };
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_registered_metrics() {
        JOB_RUNS_TOTAL.with_label_values(&["ingest", "success"]).inc();
        let text = gather().unwrap();
        assert!(text.contains("leaderboard_job_runs_total"));
    }
}
