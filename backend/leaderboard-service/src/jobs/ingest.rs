//! Hourly ingestion
//!
//! Fetches the tracked users, records what changed since the last run and
//! rebuilds the leaderboards for the current hour. Steps run in order:
//! 1. Fetch top users from the provider
//! 2. Load previous follower counts
//! 3. Upsert tracked users
//! 4. Write one follow event per changed count
//! 5. Upsert the hourly snapshot
//! 6. Recompute rankings
//!
//! Any failure aborts the remaining steps. Earlier writes stay; rerunning the
//! same hour overwrites the snapshot and rankings.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{ranking, JobError};
use crate::domain::{
    EventSource, Fid, FollowAction, HourBucket, NewFollowEvent, TrackedUser, UserMetricSnapshot,
};
use crate::metrics::FOLLOW_EVENTS_CREATED_TOTAL;
use crate::providers::{FarcasterUser, SocialGraphProvider};
use crate::repository::SnapshotStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub users_updated: usize,
    pub growth_events_created: usize,
}

/// One aggregate event per user whose follower count moved since it was last seen.
///
/// Users without a previous count are new and produce nothing.
pub fn detect_follow_events(
    users: &[FarcasterUser],
    previous_counts: &HashMap<Fid, i64>,
    detected_at: DateTime<Utc>,
) -> Vec<NewFollowEvent> {
    users
        .iter()
        .filter_map(|user| {
            let previous = previous_counts.get(&user.fid)?;
            let action = FollowAction::from_delta(user.follower_count - previous)?;
            Some(NewFollowEvent {
                source: EventSource::Aggregate,
                target_fid: user.fid,
                action,
                detected_at,
            })
        })
        .collect()
}

fn to_tracked_user(user: &FarcasterUser, seen_at: DateTime<Utc>) -> TrackedUser {
    TrackedUser {
        fid: user.fid,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        pfp_url: user.pfp_url.clone(),
        follower_count: user.follower_count,
        following_count: user.following_count,
        last_seen_at: seen_at,
    }
}

fn to_snapshot(user: &FarcasterUser, ts_hour: HourBucket) -> UserMetricSnapshot {
    UserMetricSnapshot {
        fid: user.fid,
        ts_hour: ts_hour.start(),
        follower_count: user.follower_count,
        following_count: user.following_count,
    }
}

pub async fn run_ingest(
    provider: &dyn SocialGraphProvider,
    store: &dyn SnapshotStore,
    top_n: usize,
    now: DateTime<Utc>,
) -> Result<IngestSummary, JobError> {
    let ts_hour = HourBucket::containing(now);

    let users = provider.get_top_users(top_n).await?;
    if users.is_empty() {
        return Err(JobError::EmptyProviderResult);
    }
    debug!(count = users.len(), ts_hour = %ts_hour, "Fetched top users");

    let fids: Vec<Fid> = users.iter().map(|u| u.fid).collect();
    let previous_counts = store
        .previous_follower_counts(&fids)
        .await
        .map_err(|e| JobError::persistence("load previous counts", e))?;

    let tracked: Vec<TrackedUser> = users.iter().map(|u| to_tracked_user(u, now)).collect();
    store
        .upsert_tracked_users(&tracked)
        .await
        .map_err(|e| JobError::persistence("upsert tracked_users", e))?;

    let events = detect_follow_events(&users, &previous_counts, now);
    for event in &events {
        store
            .insert_follow_event(event)
            .await
            .map_err(|e| JobError::persistence("insert follow_events", e))?;
    }
    FOLLOW_EVENTS_CREATED_TOTAL.inc_by(events.len() as u64);

    let snapshots: Vec<UserMetricSnapshot> =
        users.iter().map(|u| to_snapshot(u, ts_hour)).collect();
    store
        .upsert_metric_snapshots(&snapshots)
        .await
        .map_err(|e| JobError::persistence("upsert user_metrics_hourly", e))?;

    ranking::compute_and_store_rankings(store, &users, ts_hour).await?;

    info!(
        users_updated = users.len(),
        growth_events_created = events.len(),
        ts_hour = %ts_hour,
        "Ingestion finished"
    );

    Ok(IngestSummary {
        users_updated: users.len(),
        growth_events_created: events.len(),
    })
}
