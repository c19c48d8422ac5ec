//! Retention sweep
//!
//! Deletes rows strictly older than the retention window from every time-series
//! table. Tables are swept independently so one failure does not block the rest;
//! the run still counts as failed if any table could not be swept.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use super::JobError;
use crate::metrics::RETENTION_ROWS_DELETED_TOTAL;
use crate::repository::{RetentionTable, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub cutoff: DateTime<Utc>,
    /// Rows removed per swept table
    pub deleted_counts: BTreeMap<String, u64>,
    /// Error message per table that could not be swept
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub failures: BTreeMap<String, String>,
}

impl RetentionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_deleted(&self) -> u64 {
        self.deleted_counts.values().sum()
    }
}

impl fmt::Display for RetentionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self
            .failures
            .iter()
            .map(|(table, err)| format!("{}: {}", table, err))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "Retention failed for {}", failed)
    }
}

/// Oldest timestamp that survives a sweep at `now`
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    now - Duration::days(retention_days)
}

pub async fn run_retention(
    store: &dyn SnapshotStore,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Result<RetentionReport, JobError> {
    let cutoff = retention_cutoff(now, retention_days);
    let mut report = RetentionReport {
        cutoff,
        deleted_counts: BTreeMap::new(),
        failures: BTreeMap::new(),
    };

    for table in RetentionTable::ALL {
        match store.delete_older_than(table, cutoff).await {
            Ok(deleted) => {
                RETENTION_ROWS_DELETED_TOTAL
                    .with_label_values(&[table.table_name()])
                    .inc_by(deleted);
                report
                    .deleted_counts
                    .insert(table.table_name().to_string(), deleted);
            }
            Err(e) => {
                warn!(table = %table, error = %e, "Retention delete failed");
                report
                    .failures
                    .insert(table.table_name().to_string(), e.to_string());
            }
        }
    }

    if !report.is_complete() {
        return Err(JobError::PartialRetention(report));
    }

    info!(
        cutoff = %cutoff,
        total_deleted = report.total_deleted(),
        "Retention sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cutoff_is_exactly_retention_days_back() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
        assert_eq!(
            retention_cutoff(now, 7),
            Utc.with_ymd_and_hms(2025, 1, 8, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_display_lists_failed_tables() {
        let report = RetentionReport {
            cutoff: Utc::now(),
            deleted_counts: BTreeMap::from([("job_runs".to_string(), 4)]),
            failures: BTreeMap::from([(
                "follow_events".to_string(),
                "Database error: timeout".to_string(),
            )]),
        };

        assert!(!report.is_complete());
        assert_eq!(
            report.to_string(),
            "Retention failed for follow_events: Database error: timeout"
        );
    }
}
