use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::{QueryStore, RetentionTable, SnapshotStore, StoreError, StoreResult};
use crate::domain::{
    EventSource, Fid, FollowEvent, HourBucket, JobOutcome, JobStatus, Leaderboard, MetricKey,
    NewFollowEvent, NotificationSubscription, RankingEntry, SubscriptionUpdate, TrackedUser,
    UserMetricSnapshot,
};

const TRACKED_USER_COLUMNS: &str =
    "fid, username, display_name, pfp_url, follower_count, following_count, last_seen_at";

/// Postgres-backed store for snapshots, rankings, events and job runs
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct FollowEventRow {
    id: i64,
    source_fid: i64,
    target_fid: i64,
    action: String,
    detected_at: DateTime<Utc>,
}

impl TryFrom<FollowEventRow> for FollowEvent {
    type Error = StoreError;

    fn try_from(row: FollowEventRow) -> Result<Self, Self::Error> {
        let action = row.action.parse().map_err(|detail| StoreError::Corrupt {
            table: "follow_events",
            detail,
        })?;

        Ok(FollowEvent {
            id: row.id,
            source: EventSource::from_source_fid(row.source_fid),
            target_fid: row.target_fid,
            action,
            detected_at: row.detected_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RankingRow {
    ts_hour: DateTime<Utc>,
    metric_key: String,
    fid: i64,
    rank: i32,
    score: i64,
}

impl TryFrom<RankingRow> for RankingEntry {
    type Error = StoreError;

    fn try_from(row: RankingRow) -> Result<Self, Self::Error> {
        let metric_key = row.metric_key.parse().map_err(|detail| StoreError::Corrupt {
            table: "rankings_hourly",
            detail,
        })?;

        Ok(RankingEntry {
            ts_hour: HourBucket::containing(row.ts_hour),
            metric_key,
            fid: row.fid,
            rank: row.rank,
            score: row.score,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgStore {
    async fn previous_follower_counts(&self, fids: &[Fid]) -> StoreResult<HashMap<Fid, i64>> {
        if fids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT fid, follower_count
            FROM tracked_users
            WHERE fid = ANY($1)
            "#,
        )
        .bind(fids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn upsert_tracked_users(&self, users: &[TrackedUser]) -> StoreResult<()> {
        if users.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO tracked_users ({}) ",
            TRACKED_USER_COLUMNS
        ));
        builder.push_values(users, |mut row, user| {
            row.push_bind(user.fid)
                .push_bind(user.username.clone())
                .push_bind(user.display_name.clone())
                .push_bind(user.pfp_url.clone())
                .push_bind(user.follower_count)
                .push_bind(user.following_count)
                .push_bind(user.last_seen_at);
        });
        builder.push(
            r#"
            ON CONFLICT (fid) DO UPDATE SET
                username = EXCLUDED.username,
                display_name = EXCLUDED.display_name,
                pfp_url = EXCLUDED.pfp_url,
                follower_count = EXCLUDED.follower_count,
                following_count = EXCLUDED.following_count,
                last_seen_at = EXCLUDED.last_seen_at
            "#,
        );

        let result = builder.build().execute(&self.pool).await?;
        debug!(rows = result.rows_affected(), "Upserted tracked_users");
        Ok(())
    }

    async fn insert_follow_event(&self, event: &NewFollowEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO follow_events (source_fid, target_fid, action, detected_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.source.to_source_fid())
        .bind(event.target_fid)
        .bind(event.action.as_str())
        .bind(event.detected_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_metric_snapshots(&self, snapshots: &[UserMetricSnapshot]) -> StoreResult<()> {
        if snapshots.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO user_metrics_hourly (fid, ts_hour, follower_count, following_count) ",
        );
        builder.push_values(snapshots, |mut row, snapshot| {
            row.push_bind(snapshot.fid)
                .push_bind(snapshot.ts_hour)
                .push_bind(snapshot.follower_count)
                .push_bind(snapshot.following_count);
        });
        builder.push(
            r#"
            ON CONFLICT (fid, ts_hour) DO UPDATE SET
                follower_count = EXCLUDED.follower_count,
                following_count = EXCLUDED.following_count
            "#,
        );

        let result = builder.build().execute(&self.pool).await?;
        debug!(rows = result.rows_affected(), "Upserted user_metrics_hourly");
        Ok(())
    }

    async fn follower_counts_at(&self, ts_hour: HourBucket) -> StoreResult<HashMap<Fid, i64>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT fid, follower_count
            FROM user_metrics_hourly
            WHERE ts_hour = $1
            "#,
        )
        .bind(ts_hour.start())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn replace_leaderboard(&self, leaderboard: &Leaderboard) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM rankings_hourly
            WHERE ts_hour = $1 AND metric_key = $2
            "#,
        )
        .bind(leaderboard.ts_hour.start())
        .bind(leaderboard.metric_key.as_str())
        .execute(&mut *tx)
        .await?;

        if !leaderboard.entries.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO rankings_hourly (ts_hour, metric_key, fid, rank, score) ",
            );
            builder.push_values(&leaderboard.entries, |mut row, entry| {
                row.push_bind(entry.ts_hour.start())
                    .push_bind(entry.metric_key.as_str())
                    .push_bind(entry.fid)
                    .push_bind(entry.rank)
                    .push_bind(entry.score);
            });
            builder.push(
                r#"
                ON CONFLICT (ts_hour, metric_key, fid) DO UPDATE SET
                    rank = EXCLUDED.rank,
                    score = EXCLUDED.score
                "#,
            );
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!(
            ts_hour = %leaderboard.ts_hour,
            metric = %leaderboard.metric_key,
            entries = leaderboard.entries.len(),
            "Replaced leaderboard"
        );
        Ok(())
    }

    async fn delete_older_than(
        &self,
        table: RetentionTable,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        // Table and column names come from a closed enum, never from input.
        let sql = format!(
            "DELETE FROM {} WHERE {} < $1",
            table.table_name(),
            table.timestamp_column()
        );

        let result = sqlx::query(&sql).bind(cutoff).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn start_job_run(&self, job_name: &str, started_at: DateTime<Utc>) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO job_runs (id, job_name, status, started_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(job_name)
        .bind(JobStatus::Running.as_str())
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn finish_job_run(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
        outcome: &JobOutcome,
    ) -> StoreResult<()> {
        let (status, metadata, error_text) = match outcome {
            JobOutcome::Success(metadata) => (JobStatus::Success, Some(metadata.clone()), None),
            JobOutcome::Failure { message, metadata } => {
                (JobStatus::Error, metadata.clone(), Some(message.clone()))
            }
        };

        sqlx::query(
            r#"
            UPDATE job_runs
            SET finished_at = $2, status = $3, metadata = $4, error_text = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(finished_at)
        .bind(status.as_str())
        .bind(metadata)
        .bind(error_text)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl QueryStore for PgStore {
    async fn latest_ranking_hour(&self, metric: MetricKey) -> StoreResult<Option<HourBucket>> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MAX(ts_hour)
            FROM rankings_hourly
            WHERE metric_key = $1
            "#,
        )
        .bind(metric.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(latest.map(HourBucket::containing))
    }

    async fn ranking_page(
        &self,
        ts_hour: HourBucket,
        metric: MetricKey,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RankingEntry>, i64)> {
        let rows = sqlx::query_as::<_, RankingRow>(
            r#"
            SELECT ts_hour, metric_key, fid, rank, score
            FROM rankings_hourly
            WHERE ts_hour = $1 AND metric_key = $2
            ORDER BY rank ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(ts_hour.start())
        .bind(metric.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM rankings_hourly
            WHERE ts_hour = $1 AND metric_key = $2
            "#,
        )
        .bind(ts_hour.start())
        .bind(metric.as_str())
        .fetch_one(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(RankingEntry::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((entries, total))
    }

    async fn tracked_users_by_fids(&self, fids: &[Fid]) -> StoreResult<Vec<TrackedUser>> {
        if fids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM tracked_users WHERE fid = ANY($1)",
            TRACKED_USER_COLUMNS
        );
        let users = sqlx::query_as::<_, TrackedUser>(&sql)
            .bind(fids)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn tracked_user(&self, fid: Fid) -> StoreResult<Option<TrackedUser>> {
        let sql = format!(
            "SELECT {} FROM tracked_users WHERE fid = $1",
            TRACKED_USER_COLUMNS
        );
        let user = sqlx::query_as::<_, TrackedUser>(&sql)
            .bind(fid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn follow_events_page(
        &self,
        fid: Option<Fid>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<FollowEvent>, i64)> {
        let rows = sqlx::query_as::<_, FollowEventRow>(
            r#"
            SELECT id, source_fid, target_fid, action, detected_at
            FROM follow_events
            WHERE $1::BIGINT IS NULL OR source_fid = $1 OR target_fid = $1
            ORDER BY detected_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(fid)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM follow_events
            WHERE $1::BIGINT IS NULL OR source_fid = $1 OR target_fid = $1
            "#,
        )
        .bind(fid)
        .fetch_one(&self.pool)
        .await?;

        let events = rows
            .into_iter()
            .map(FollowEvent::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((events, total))
    }

    async fn metric_history(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserMetricSnapshot>> {
        let snapshots = sqlx::query_as::<_, UserMetricSnapshot>(
            r#"
            SELECT fid, ts_hour, follower_count, following_count
            FROM user_metrics_hourly
            WHERE fid = $1 AND ts_hour >= $2
            ORDER BY ts_hour ASC
            "#,
        )
        .bind(fid)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(snapshots)
    }

    async fn events_for_target(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<FollowEvent>> {
        let rows = sqlx::query_as::<_, FollowEventRow>(
            r#"
            SELECT id, source_fid, target_fid, action, detected_at
            FROM follow_events
            WHERE target_fid = $1 AND detected_at >= $2
            ORDER BY detected_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(fid)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FollowEvent::try_from).collect()
    }

    async fn upsert_subscription(
        &self,
        update: &SubscriptionUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<NotificationSubscription> {
        let subscription = sqlx::query_as::<_, NotificationSubscription>(
            r#"
            INSERT INTO notification_subscriptions
                (fid, enabled, channel, threshold_followers, locale, created_at, updated_at)
            VALUES ($1, COALESCE($2, TRUE), COALESCE($3, 'in_app'), $4, COALESCE($5, 'en'), $6, $6)
            ON CONFLICT (fid) DO UPDATE SET
                enabled = COALESCE($2, notification_subscriptions.enabled),
                channel = COALESCE($3, notification_subscriptions.channel),
                threshold_followers = COALESCE($4, notification_subscriptions.threshold_followers),
                locale = COALESCE($5, notification_subscriptions.locale),
                updated_at = $6
            RETURNING fid, enabled, channel, threshold_followers, locale, created_at, updated_at
            "#,
        )
        .bind(update.fid)
        .bind(update.enabled)
        .bind(update.channel.clone())
        .bind(update.threshold_followers)
        .bind(update.locale.map(|l| l.as_str()))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn subscription(&self, fid: Fid) -> StoreResult<Option<NotificationSubscription>> {
        let subscription = sqlx::query_as::<_, NotificationSubscription>(
            r#"
            SELECT fid, enabled, channel, threshold_followers, locale, created_at, updated_at
            FROM notification_subscriptions
            WHERE fid = $1
            "#,
        )
        .bind(fid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn set_subscription_enabled(
        &self,
        fid: Fid,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notification_subscriptions
            SET enabled = $2, updated_at = $3
            WHERE fid = $1
            "#,
        )
        .bind(fid)
        .bind(enabled)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
