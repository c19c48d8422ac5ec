//! In-memory fakes for the store and provider traits
//!
//! Both fakes keep their state behind a `Mutex` so tests can seed data,
//! inject failures and inspect writes after a job or request ran.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use leaderboard_service::config::JobsConfig;
use leaderboard_service::domain::{
    EventSource, Fid, FollowAction, FollowEvent, HourBucket, JobOutcome, JobStatus,
    Leaderboard, MetricKey, NewFollowEvent, NotificationSubscription, RankingEntry,
    SubscriptionUpdate, TrackedUser, UserMetricSnapshot,
};
use leaderboard_service::handlers::AppState;
use leaderboard_service::jobs::JobContext;
use leaderboard_service::providers::{
    FarcasterUser, FollowerEdge, ProviderError, ProviderResult, SocialGraphProvider,
};
use leaderboard_service::repository::{
    QueryStore, RetentionTable, SnapshotStore, StoreError, StoreResult,
};

pub const TEST_SECRET: &str = "test-cron-secret";

/// A `job_runs` row as the fake store keeps it
#[derive(Debug, Clone, PartialEq)]
pub struct JobRun {
    pub id: Uuid,
    pub job_name: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub error_text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub tracked_users: BTreeMap<Fid, TrackedUser>,
    pub metrics: BTreeMap<(Fid, DateTime<Utc>), UserMetricSnapshot>,
    pub follow_events: Vec<FollowEvent>,
    pub rankings: BTreeMap<(HourBucket, MetricKey), Vec<RankingEntry>>,
    pub job_runs: Vec<JobRun>,
    pub subscriptions: BTreeMap<Fid, NotificationSubscription>,
    next_event_id: i64,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    failing: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the named operation fail from now on.
    ///
    /// Retention deletes are named `delete:<table>`.
    pub fn fail_on(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.lock().unwrap().clone()
    }

    pub fn seed_tracked_user(&self, fid: Fid, follower_count: i64) {
        self.with_state(|s| {
            s.tracked_users.insert(fid, tracked_user(fid, follower_count, Utc::now()));
        });
    }

    pub fn seed_snapshot(&self, fid: Fid, ts_hour: HourBucket, follower_count: i64) {
        self.with_state(|s| {
            s.metrics.insert(
                (fid, ts_hour.start()),
                UserMetricSnapshot {
                    fid,
                    ts_hour: ts_hour.start(),
                    follower_count,
                    following_count: 0,
                },
            );
        });
    }

    pub fn seed_event(
        &self,
        source: EventSource,
        target_fid: Fid,
        action: FollowAction,
        detected_at: DateTime<Utc>,
    ) {
        self.with_state(|s| push_event(s, source, target_fid, action, detected_at));
    }

    fn check(&self, op: &str) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(StoreError::Database(format!("injected failure: {}", op)));
        }
        Ok(())
    }
}

fn push_event(
    s: &mut StoreState,
    source: EventSource,
    target_fid: Fid,
    action: FollowAction,
    detected_at: DateTime<Utc>,
) {
    s.next_event_id += 1;
    s.follow_events.push(FollowEvent {
        id: s.next_event_id,
        source,
        target_fid,
        action,
        detected_at,
    });
}

pub fn tracked_user(fid: Fid, follower_count: i64, seen_at: DateTime<Utc>) -> TrackedUser {
    TrackedUser {
        fid,
        username: format!("user{}", fid),
        display_name: format!("User {}", fid),
        pfp_url: None,
        follower_count,
        following_count: 10,
        last_seen_at: seen_at,
    }
}

fn newest_first(events: &mut [FollowEvent]) {
    events.sort_by(|a, b| b.detected_at.cmp(&a.detected_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn previous_follower_counts(&self, fids: &[Fid]) -> StoreResult<HashMap<Fid, i64>> {
        self.check("previous_follower_counts")?;
        Ok(self.with_state(|s| {
            fids.iter()
                .filter_map(|fid| s.tracked_users.get(fid).map(|u| (*fid, u.follower_count)))
                .collect()
        }))
    }

    async fn upsert_tracked_users(&self, users: &[TrackedUser]) -> StoreResult<()> {
        self.check("upsert_tracked_users")?;
        self.with_state(|s| {
            for user in users {
                s.tracked_users.insert(user.fid, user.clone());
            }
        });
        Ok(())
    }

    async fn insert_follow_event(&self, event: &NewFollowEvent) -> StoreResult<()> {
        self.check("insert_follow_event")?;
        self.with_state(|s| {
            push_event(
                s,
                event.source,
                event.target_fid,
                event.action,
                event.detected_at,
            )
        });
        Ok(())
    }

    async fn upsert_metric_snapshots(&self, snapshots: &[UserMetricSnapshot]) -> StoreResult<()> {
        self.check("upsert_metric_snapshots")?;
        self.with_state(|s| {
            for snapshot in snapshots {
                s.metrics
                    .insert((snapshot.fid, snapshot.ts_hour), snapshot.clone());
            }
        });
        Ok(())
    }

    async fn follower_counts_at(&self, ts_hour: HourBucket) -> StoreResult<HashMap<Fid, i64>> {
        self.check("follower_counts_at")?;
        Ok(self.with_state(|s| {
            s.metrics
                .values()
                .filter(|m| m.ts_hour == ts_hour.start())
                .map(|m| (m.fid, m.follower_count))
                .collect()
        }))
    }

    async fn replace_leaderboard(&self, leaderboard: &Leaderboard) -> StoreResult<()> {
        self.check("replace_leaderboard")?;
        self.with_state(|s| {
            s.rankings.insert(
                (leaderboard.ts_hour, leaderboard.metric_key),
                leaderboard.entries.clone(),
            );
        });
        Ok(())
    }

    async fn delete_older_than(
        &self,
        table: RetentionTable,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.check(&format!("delete:{}", table.table_name()))?;
        Ok(self.with_state(|s| {
            let before;
            let after;
            match table {
                RetentionTable::FollowEvents => {
                    before = s.follow_events.len();
                    s.follow_events.retain(|e| e.detected_at >= cutoff);
                    after = s.follow_events.len();
                }
                RetentionTable::UserMetricsHourly => {
                    before = s.metrics.len();
                    s.metrics.retain(|_, m| m.ts_hour >= cutoff);
                    after = s.metrics.len();
                }
                RetentionTable::RankingsHourly => {
                    before = s.rankings.values().map(Vec::len).sum::<usize>();
                    s.rankings.retain(|(hour, _), _| hour.start() >= cutoff);
                    after = s.rankings.values().map(Vec::len).sum::<usize>();
                }
                RetentionTable::JobRuns => {
                    before = s.job_runs.len();
                    s.job_runs.retain(|r| r.started_at >= cutoff);
                    after = s.job_runs.len();
                }
            }
            (before - after) as u64
        }))
    }

    async fn start_job_run(&self, job_name: &str, started_at: DateTime<Utc>) -> StoreResult<Uuid> {
        self.check("start_job_run")?;
        let id = Uuid::new_v4();
        self.with_state(|s| {
            s.job_runs.push(JobRun {
                id,
                job_name: job_name.to_string(),
                status: JobStatus::Running,
                started_at,
                finished_at: None,
                metadata: None,
                error_text: None,
            })
        });
        Ok(id)
    }

    async fn finish_job_run(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
        outcome: &JobOutcome,
    ) -> StoreResult<()> {
        self.check("finish_job_run")?;
        self.with_state(|s| {
            if let Some(run) = s.job_runs.iter_mut().find(|r| r.id == id) {
                run.finished_at = Some(finished_at);
                match outcome {
                    JobOutcome::Success(metadata) => {
                        run.status = JobStatus::Success;
                        run.metadata = Some(metadata.clone());
                    }
                    JobOutcome::Failure { message, metadata } => {
                        run.status = JobStatus::Error;
                        run.metadata = metadata.clone();
                        run.error_text = Some(message.clone());
                    }
                }
            }
        });
        Ok(())
    }
}

#[async_trait]
impl QueryStore for InMemoryStore {
    async fn latest_ranking_hour(&self, metric: MetricKey) -> StoreResult<Option<HourBucket>> {
        self.check("latest_ranking_hour")?;
        Ok(self.with_state(|s| {
            s.rankings
                .keys()
                .filter(|(_, m)| *m == metric)
                .map(|(hour, _)| *hour)
                .max()
        }))
    }

    async fn ranking_page(
        &self,
        ts_hour: HourBucket,
        metric: MetricKey,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RankingEntry>, i64)> {
        self.check("ranking_page")?;
        Ok(self.with_state(|s| {
            let mut entries = s
                .rankings
                .get(&(ts_hour, metric))
                .cloned()
                .unwrap_or_default();
            entries.sort_by_key(|e| e.rank);
            let total = entries.len() as i64;
            let page = entries
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            (page, total)
        }))
    }

    async fn tracked_users_by_fids(&self, fids: &[Fid]) -> StoreResult<Vec<TrackedUser>> {
        self.check("tracked_users_by_fids")?;
        Ok(self.with_state(|s| {
            fids.iter()
                .filter_map(|fid| s.tracked_users.get(fid).cloned())
                .collect()
        }))
    }

    async fn tracked_user(&self, fid: Fid) -> StoreResult<Option<TrackedUser>> {
        self.check("tracked_user")?;
        Ok(self.with_state(|s| s.tracked_users.get(&fid).cloned()))
    }

    async fn follow_events_page(
        &self,
        fid: Option<Fid>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<FollowEvent>, i64)> {
        self.check("follow_events_page")?;
        Ok(self.with_state(|s| {
            let mut events: Vec<FollowEvent> = s
                .follow_events
                .iter()
                .filter(|e| match fid {
                    Some(fid) => e.target_fid == fid || e.source.to_source_fid() == fid,
                    None => true,
                })
                .cloned()
                .collect();
            newest_first(&mut events);
            let total = events.len() as i64;
            let page = events
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            (page, total)
        }))
    }

    async fn metric_history(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserMetricSnapshot>> {
        self.check("metric_history")?;
        Ok(self.with_state(|s| {
            let mut history: Vec<UserMetricSnapshot> = s
                .metrics
                .values()
                .filter(|m| m.fid == fid && m.ts_hour >= since)
                .cloned()
                .collect();
            history.sort_by_key(|m| m.ts_hour);
            history
        }))
    }

    async fn events_for_target(
        &self,
        fid: Fid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<FollowEvent>> {
        self.check("events_for_target")?;
        Ok(self.with_state(|s| {
            let mut events: Vec<FollowEvent> = s
                .follow_events
                .iter()
                .filter(|e| e.target_fid == fid && e.detected_at >= since)
                .cloned()
                .collect();
            newest_first(&mut events);
            events.truncate(limit as usize);
            events
        }))
    }

    async fn upsert_subscription(
        &self,
        update: &SubscriptionUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<NotificationSubscription> {
        self.check("upsert_subscription")?;
        Ok(self.with_state(|s| {
            let entry = s
                .subscriptions
                .entry(update.fid)
                .or_insert_with(|| NotificationSubscription {
                    fid: update.fid,
                    enabled: true,
                    channel: "in_app".to_string(),
                    threshold_followers: None,
                    locale: "en".to_string(),
                    created_at: now,
                    updated_at: now,
                });
            if let Some(enabled) = update.enabled {
                entry.enabled = enabled;
            }
            if let Some(channel) = &update.channel {
                entry.channel = channel.clone();
            }
            if let Some(threshold) = update.threshold_followers {
                entry.threshold_followers = Some(threshold);
            }
            if let Some(locale) = update.locale {
                entry.locale = locale.as_str().to_string();
            }
            entry.updated_at = now;
            entry.clone()
        }))
    }

    async fn subscription(&self, fid: Fid) -> StoreResult<Option<NotificationSubscription>> {
        self.check("subscription")?;
        Ok(self.with_state(|s| s.subscriptions.get(&fid).cloned()))
    }

    async fn set_subscription_enabled(
        &self,
        fid: Fid,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check("set_subscription_enabled")?;
        Ok(self.with_state(|s| match s.subscriptions.get_mut(&fid) {
            Some(sub) => {
                sub.enabled = enabled;
                sub.updated_at = now;
                true
            }
            None => false,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check("ping")
    }
}

// ============================================================================
// Provider
// ============================================================================

#[derive(Default)]
pub struct FakeProvider {
    users: Mutex<Vec<FarcasterUser>>,
    fail_reads: Mutex<bool>,
    reject_signer: Mutex<bool>,
    /// (action, signer_uuid, target_fid) for every write received
    pub writes: Mutex<Vec<(String, String, Fid)>>,
}

impl FakeProvider {
    pub fn with_users(users: Vec<FarcasterUser>) -> Arc<Self> {
        let provider = Self::default();
        *provider.users.lock().unwrap() = users;
        Arc::new(provider)
    }

    pub fn set_users(&self, users: Vec<FarcasterUser>) {
        *self.users.lock().unwrap() = users;
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    pub fn reject_signer(&self) {
        *self.reject_signer.lock().unwrap() = true;
    }

    fn read_guard(&self) -> ProviderResult<()> {
        if *self.fail_reads.lock().unwrap() {
            return Err(ProviderError::Api {
                path: "/user/bulk".to_string(),
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn record_write(&self, action: &str, signer_uuid: &str, target_fid: Fid) -> ProviderResult<()> {
        if *self.reject_signer.lock().unwrap() {
            return Err(ProviderError::SignerNotApproved(
                "signer is not approved".to_string(),
            ));
        }
        self.writes
            .lock()
            .unwrap()
            .push((action.to_string(), signer_uuid.to_string(), target_fid));
        Ok(())
    }
}

pub fn farcaster_user(fid: Fid, follower_count: i64) -> FarcasterUser {
    FarcasterUser {
        fid,
        username: format!("user{}", fid),
        display_name: format!("User {}", fid),
        pfp_url: Some(format!("https://example.com/{}.png", fid)),
        follower_count,
        following_count: 10,
    }
}

#[async_trait]
impl SocialGraphProvider for FakeProvider {
    async fn get_top_users(&self, limit: usize) -> ProviderResult<Vec<FarcasterUser>> {
        self.read_guard()?;
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by(|a, b| b.follower_count.cmp(&a.follower_count));
        users.truncate(limit);
        Ok(users)
    }

    async fn get_users_by_fids(&self, fids: &[Fid]) -> ProviderResult<Vec<FarcasterUser>> {
        self.read_guard()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| fids.contains(&u.fid))
            .cloned()
            .collect())
    }

    async fn get_followers(&self, _fid: Fid, _limit: usize) -> ProviderResult<Vec<FollowerEdge>> {
        self.read_guard()?;
        Ok(Vec::new())
    }

    async fn follow_user(&self, signer_uuid: &str, target_fid: Fid) -> ProviderResult<()> {
        self.record_write("follow", signer_uuid, target_fid)
    }

    async fn unfollow_user(&self, signer_uuid: &str, target_fid: Fid) -> ProviderResult<()> {
        self.record_write("unfollow", signer_uuid, target_fid)
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn jobs_config() -> JobsConfig {
    JobsConfig {
        cron_secret: Some(TEST_SECRET.to_string()),
        ..JobsConfig::default()
    }
}

pub fn job_context(provider: Arc<FakeProvider>, store: Arc<InMemoryStore>) -> JobContext {
    JobContext::new(provider, store, jobs_config())
}

pub fn app_state(provider: Arc<FakeProvider>, store: Arc<InMemoryStore>) -> AppState {
    AppState::new(
        job_context(provider.clone(), store.clone()),
        store,
        provider,
    )
}
