//! Persistence layer
//!
//! Jobs depend on [`SnapshotStore`]; the read endpoints depend on [`QueryStore`].
//! [`PgStore`] implements both over a single Postgres pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Fid, FollowEvent, HourBucket, JobOutcome, Leaderboard, MetricKey, NewFollowEvent,
    NotificationSubscription, RankingEntry, SubscriptionUpdate, TrackedUser, UserMetricSnapshot,
};

pub mod postgres;

pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Tables swept by retention, each with the timestamp column it is aged by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionTable {
    FollowEvents,
    UserMetricsHourly,
    RankingsHourly,
    JobRuns,
}

impl RetentionTable {
    pub const ALL: [RetentionTable; 4] = [
        RetentionTable::FollowEvents,
        RetentionTable::UserMetricsHourly,
        RetentionTable::RankingsHourly,
        RetentionTable::JobRuns,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            RetentionTable::FollowEvents => "follow_events",
            RetentionTable::UserMetricsHourly => "user_metrics_hourly",
            RetentionTable::RankingsHourly => "rankings_hourly",
            RetentionTable::JobRuns => "job_runs",
        }
    }

    pub fn timestamp_column(&self) -> &'static str {
        match self {
            RetentionTable::FollowEvents => "detected_at",
            RetentionTable::UserMetricsHourly | RetentionTable::RankingsHourly => "ts_hour",
            RetentionTable::JobRuns => "started_at",
        }
    }
}

impl fmt::Display for RetentionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Writes and lookups performed by the ingestion, ranking and retention jobs
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Last stored follower count per fid; fids never seen are absent
    async fn previous_follower_counts(&self, fids: &[Fid]) -> StoreResult<HashMap<Fid, i64>>;

    async fn upsert_tracked_users(&self, users: &[TrackedUser]) -> StoreResult<()>;

    async fn insert_follow_event(&self, event: &NewFollowEvent) -> StoreResult<()>;

    /// Upsert keyed by (fid, ts_hour)
    async fn upsert_metric_snapshots(&self, snapshots: &[UserMetricSnapshot]) -> StoreResult<()>;

    /// Follower counts recorded at exactly `ts_hour`
    async fn follower_counts_at(&self, ts_hour: HourBucket) -> StoreResult<HashMap<Fid, i64>>;

    /// Replace the stored leaderboard for (ts_hour, metric_key) atomically
    async fn replace_leaderboard(&self, leaderboard: &Leaderboard) -> StoreResult<()>;

    /// Delete rows strictly older than `cutoff`; returns the number removed
    async fn delete_older_than(
        &self,
        table: RetentionTable,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn start_job_run(&self, job_name: &str, started_at: DateTime<Utc>) -> StoreResult<Uuid>;

    async fn finish_job_run(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
        outcome: &JobOutcome,
    ) -> StoreResult<()>;
}

/// Reads behind the public API plus notification settings
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Most recent hour bucket that has rows for `metric`
    async fn latest_ranking_hour(&self, metric: MetricKey) -> StoreResult<Option<HourBucket>>;

    /// Page of a leaderboard ordered by rank, plus the leaderboard size
    async fn ranking_page(
        &self,
        ts_hour: HourBucket,
        metric: MetricKey,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RankingEntry>, i64)>;

    async fn tracked_users_by_fids(&self, fids: &[Fid]) -> StoreResult<Vec<TrackedUser>>;

    async fn tracked_user(&self, fid: Fid) -> StoreResult<Option<TrackedUser>>;

    /// Newest-first events, optionally restricted to those involving `fid`
    async fn follow_events_page(
        &self,
        fid: Option<Fid>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<FollowEvent>, i64)>;

    /// Snapshots for `fid` at or after `since`, oldest first
    async fn metric_history(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserMetricSnapshot>>;

    /// Events targeting `fid` at or after `since`, newest first
    async fn events_for_target(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<FollowEvent>>;

    async fn upsert_subscription(
        &self,
        update: &SubscriptionUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<NotificationSubscription>;

    async fn subscription(&self, fid: Fid) -> StoreResult<Option<NotificationSubscription>>;

    /// Returns false when no subscription exists for `fid`
    async fn set_subscription_enabled(
        &self,
        fid: Fid,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> StoreResult<()>;
}
