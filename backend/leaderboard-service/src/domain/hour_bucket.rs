//! Hour buckets: the time-series partition key for snapshots and rankings.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_PER_HOUR: i64 = 3600;

/// A UTC timestamp truncated to the top of the hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourBucket(DateTime<Utc>);

impl HourBucket {
    /// Bucket containing `ts` (minutes, seconds and sub-seconds zeroed).
    pub fn containing(ts: DateTime<Utc>) -> Self {
        let secs = ts.timestamp();
        let floored = secs - secs.rem_euclid(SECONDS_PER_HOUR);
        // Flooring an in-range timestamp never leaves chrono's range.
        Self(DateTime::from_timestamp(floored, 0).unwrap_or(ts))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }

    /// Bucket `hours` earlier, used for growth horizons.
    pub fn hours_before(&self, hours: i64) -> Self {
        Self(self.0 - Duration::hours(hours))
    }
}

impl From<HourBucket> for DateTime<Utc> {
    fn from(bucket: HourBucket) -> Self {
        bucket.0
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}
