//! Leaderboard computation
//!
//! Scores are derived from the snapshot just ingested. Growth metrics compare
//! against the snapshot stored exactly N hours earlier; a user without one
//! scores 0 growth.
use std::collections::HashMap;
use tracing::debug;

use super::JobError;
use crate::domain::{Fid, HourBucket, Leaderboard, MetricKey, RankingEntry};
use crate::providers::FarcasterUser;
use crate::repository::SnapshotStore;

/// Order `(fid, score)` pairs by score descending, fid ascending, and assign ranks 1..=N
pub fn rank_scores(
    ts_hour: HourBucket,
    metric_key: MetricKey,
    mut scores: Vec<(Fid, i64)>,
) -> Leaderboard {
    scores.sort_by(|(fid_a, score_a), (fid_b, score_b)| {
        score_b.cmp(score_a).then_with(|| fid_a.cmp(fid_b))
    });

    let entries = scores
        .into_iter()
        .enumerate()
        .map(|(idx, (fid, score))| RankingEntry {
            ts_hour,
            metric_key,
            fid,
            rank: idx as i32 + 1,
            score,
        })
        .collect();

    Leaderboard {
        ts_hour,
        metric_key,
        entries,
    }
}

/// Score every user for `metric`.
///
/// `historical` holds follower counts at the comparison hour and is ignored
/// for [`MetricKey::FollowerCount`].
pub fn compute_leaderboard(
    users: &[FarcasterUser],
    ts_hour: HourBucket,
    metric: MetricKey,
    historical: &HashMap<Fid, i64>,
) -> Leaderboard {
    let scores = users
        .iter()
        .map(|user| {
            let score = match metric.growth_horizon_hours() {
                None => user.follower_count,
                Some(_) => historical
                    .get(&user.fid)
                    .map(|previous| user.follower_count - previous)
                    .unwrap_or(0),
            };
            (user.fid, score)
        })
        .collect();

    rank_scores(ts_hour, metric, scores)
}

/// Compute all leaderboards for `ts_hour` and replace whatever was stored for that hour
pub async fn compute_and_store_rankings(
    store: &dyn SnapshotStore,
    users: &[FarcasterUser],
    ts_hour: HourBucket,
) -> Result<Vec<Leaderboard>, JobError> {
    let mut leaderboards = Vec::with_capacity(MetricKey::ALL.len());

    for metric in MetricKey::ALL {
        let historical = match metric.growth_horizon_hours() {
            Some(hours) => store
                .follower_counts_at(ts_hour.hours_before(hours))
                .await
                .map_err(|e| JobError::persistence("load historical snapshots", e))?,
            None => HashMap::new(),
        };

        let leaderboard = compute_leaderboard(users, ts_hour, metric, &historical);

        store
            .replace_leaderboard(&leaderboard)
            .await
            .map_err(|e| JobError::persistence("store rankings", e))?;

        debug!(
            metric = %metric,
            ts_hour = %ts_hour,
            entries = leaderboard.entries.len(),
            "Stored leaderboard"
        );
        leaderboards.push(leaderboard);
    }

    Ok(leaderboards)
}
