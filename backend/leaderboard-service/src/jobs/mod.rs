//! Scheduled jobs
//!
//! Jobs are triggered over HTTP by an external scheduler and run to completion
//! inside the request. Every invocation is wrapped in a `job_runs` audit row:
//! - `running` on start
//! - `success` with the job summary as metadata
//! - `error` with the error message, plus any partial result as metadata
//!
//! Nothing is retried here; a failed run waits for the next trigger.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::JobsConfig;
use crate::domain::JobOutcome;
use crate::metrics::{JOB_DURATION_SECONDS, JOB_RUNS_TOTAL};
use crate::providers::{ProviderError, SocialGraphProvider};
use crate::repository::{SnapshotStore, StoreError};

pub mod ingest;
pub mod ranking;
pub mod retention;

pub use ingest::IngestSummary;
pub use retention::RetentionReport;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("No users returned from provider")]
    EmptyProviderResult,

    #[error("{step} failed: {source}")]
    Persistence {
        step: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{0}")]
    PartialRetention(RetentionReport),
}

impl JobError {
    pub fn persistence(step: &'static str, source: StoreError) -> Self {
        JobError::Persistence { step, source }
    }

    /// Work completed before the failure, kept as run metadata
    pub fn partial_result(&self) -> Option<serde_json::Value> {
        match self {
            JobError::PartialRetention(report) => serde_json::to_value(report).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobName {
    Ingest,
    Retention,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Ingest => "ingest",
            JobName::Retention => "retention",
        }
    }
}

/// Dependencies shared by every job invocation
#[derive(Clone)]
pub struct JobContext {
    pub provider: Arc<dyn SocialGraphProvider>,
    pub store: Arc<dyn SnapshotStore>,
    pub config: JobsConfig,
}

impl JobContext {
    pub fn new(
        provider: Arc<dyn SocialGraphProvider>,
        store: Arc<dyn SnapshotStore>,
        config: JobsConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    /// Exact-match check of the trigger secret; an unconfigured secret rejects everything
    pub fn authorize(&self, provided: Option<&str>) -> bool {
        match (self.config.cron_secret.as_deref(), provided) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }

    pub async fn run_ingest(&self, now: DateTime<Utc>) -> Result<IngestSummary, JobError> {
        run_recorded(
            self.store.as_ref(),
            JobName::Ingest,
            ingest::run_ingest(
                self.provider.as_ref(),
                self.store.as_ref(),
                self.config.top_n,
                now,
            ),
        )
        .await
    }

    pub async fn run_retention(&self, now: DateTime<Utc>) -> Result<RetentionReport, JobError> {
        run_recorded(
            self.store.as_ref(),
            JobName::Retention,
            retention::run_retention(self.store.as_ref(), self.config.retention_days, now),
        )
        .await
    }
}

/// Run `job` between a `running` and a terminal `job_runs` write.
///
/// Failing to write the audit row never fails the job itself.
pub async fn run_recorded<T, F>(
    store: &dyn SnapshotStore,
    job: JobName,
    fut: F,
) -> Result<T, JobError>
where
    T: Serialize,
    F: Future<Output = Result<T, JobError>>,
{
    let job_name = job.as_str();
    let start = Instant::now();

    let run_id = match store.start_job_run(job_name, Utc::now()).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(job_name, error = %e, "Failed to record job start, continuing unrecorded");
            None
        }
    };

    info!(job_name, run_id = ?run_id, "Starting job");

    let result = fut.await;

    let outcome = match &result {
        Ok(summary) => JobOutcome::Success(serde_json::to_value(summary).unwrap_or_else(|e| {
            serde_json::json!({ "summary_error": e.to_string() })
        })),
        Err(e) => JobOutcome::Failure {
            message: e.to_string(),
            metadata: e.partial_result(),
        },
    };

    let elapsed = start.elapsed();
    JOB_DURATION_SECONDS
        .with_label_values(&[job_name])
        .observe(elapsed.as_secs_f64());

    match &outcome {
        JobOutcome::Success(_) => {
            JOB_RUNS_TOTAL.with_label_values(&[job_name, "success"]).inc();
            info!(
                job_name,
                run_id = ?run_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job completed"
            );
        }
        JobOutcome::Failure { message, .. } => {
            JOB_RUNS_TOTAL.with_label_values(&[job_name, "error"]).inc();
            error!(
                job_name,
                run_id = ?run_id,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %message,
                "Job failed"
            );
        }
    }

    if let Some(id) = run_id {
        if let Err(e) = store.finish_job_run(id, Utc::now(), &outcome).await {
            warn!(job_name, run_id = %id, error = %e, "Failed to record job completion");
        }
    }

    result
}
