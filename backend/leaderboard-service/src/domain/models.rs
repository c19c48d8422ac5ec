use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::HourBucket;

/// Farcaster identifier
pub type Fid = i64;

/// Latest known state of a tracked account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackedUser {
    pub fid: Fid,
    pub username: String,
    pub display_name: String,
    pub pfp_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub last_seen_at: DateTime<Utc>,
}

/// One row of the hourly follower time series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserMetricSnapshot {
    pub fid: Fid,
    pub ts_hour: DateTime<Utc>,
    pub follower_count: i64,
    pub following_count: i64,
}

// ============================================================================
// Follow events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowAction {
    Follow,
    Unfollow,
}

impl FollowAction {
    /// Action implied by a net follower delta; `None` when nothing changed.
    pub fn from_delta(delta: i64) -> Option<Self> {
        match delta {
            0 => None,
            d if d > 0 => Some(FollowAction::Follow),
            _ => Some(FollowAction::Unfollow),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FollowAction::Follow => "follow",
            FollowAction::Unfollow => "unfollow",
        }
    }
}

impl FromStr for FollowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(FollowAction::Follow),
            "unfollow" => Ok(FollowAction::Unfollow),
            other => Err(format!("unknown follow action: {}", other)),
        }
    }
}

/// Who caused a follow event.
///
/// The provider only exposes follower totals, so synthesized events carry
/// `Aggregate`: a net change that cannot be attributed to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fid", rename_all = "snake_case")]
pub enum EventSource {
    Aggregate,
    Individual(Fid),
}

impl EventSource {
    /// Storage encoding of `Aggregate` in `follow_events.source_fid`
    pub const AGGREGATE_SOURCE_FID: Fid = 0;

    pub fn to_source_fid(self) -> Fid {
        match self {
            EventSource::Aggregate => Self::AGGREGATE_SOURCE_FID,
            EventSource::Individual(fid) => fid,
        }
    }

    pub fn from_source_fid(fid: Fid) -> Self {
        if fid == Self::AGGREGATE_SOURCE_FID {
            EventSource::Aggregate
        } else {
            EventSource::Individual(fid)
        }
    }
}

/// Event about to be written (no id yet)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFollowEvent {
    pub source: EventSource,
    pub target_fid: Fid,
    pub action: FollowAction,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEvent {
    pub id: i64,
    pub source: EventSource,
    pub target_fid: Fid,
    pub action: FollowAction,
    pub detected_at: DateTime<Utc>,
}

// ============================================================================
// Rankings
// ============================================================================

/// Leaderboard identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKey {
    #[serde(rename = "follower_count")]
    FollowerCount,
    #[serde(rename = "24h_growth")]
    Growth24h,
    #[serde(rename = "6h_growth")]
    Growth6h,
}

impl MetricKey {
    pub const ALL: [MetricKey; 3] = [
        MetricKey::FollowerCount,
        MetricKey::Growth24h,
        MetricKey::Growth6h,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::FollowerCount => "follower_count",
            MetricKey::Growth24h => "24h_growth",
            MetricKey::Growth6h => "6h_growth",
        }
    }

    /// Comparison horizon in hours for growth metrics
    pub fn growth_horizon_hours(&self) -> Option<i64> {
        match self {
            MetricKey::FollowerCount => None,
            MetricKey::Growth24h => Some(24),
            MetricKey::Growth6h => Some(6),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid metric. Use: {}",
                    MetricKey::ALL.map(|m| m.as_str()).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub ts_hour: HourBucket,
    pub metric_key: MetricKey,
    pub fid: Fid,
    pub rank: i32,
    pub score: i64,
}

/// One full leaderboard for an hour bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    pub ts_hour: HourBucket,
    pub metric_key: MetricKey,
    pub entries: Vec<RankingEntry>,
}

/// Ranked row joined with the current user state for the read API
#[derive(Debug, Clone, Serialize)]
pub struct RankedUser {
    pub rank: i32,
    pub score: i64,
    pub user: Option<TrackedUser>,
}

// ============================================================================
// Job runs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }
}

/// Terminal state written back to a job run
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success(serde_json::Value),
    /// Partial results, if any, are kept in `metadata` next to the message
    Failure {
        message: String,
        metadata: Option<serde_json::Value>,
    },
}

// ============================================================================
// Notification subscriptions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Ja,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ja => "ja",
        }
    }

    /// Only the supported locales are accepted; anything else is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Locale::En),
            "ja" => Some(Locale::Ja),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationSubscription {
    pub fid: Fid,
    pub enabled: bool,
    pub channel: String,
    pub threshold_followers: Option<i64>,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial upsert: `None` fields keep their stored value (or the column default)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub fid: Fid,
    pub enabled: Option<bool>,
    pub channel: Option<String>,
    pub threshold_followers: Option<i64>,
    pub locale: Option<Locale>,
}

pub const IN_APP_CHANNEL: &str = "in_app";
