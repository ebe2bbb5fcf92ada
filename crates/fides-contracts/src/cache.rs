//! Prediction cache types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a cached prediction: which subject it concerns and at
/// what horizon, e.g. `tenant-7` at `24h`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub subject: String,
    pub horizon: String,
}

impl CacheKey {
    pub fn new(subject: impl Into<String>, horizon: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            horizon: horizon.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.subject, self.horizon)
    }
}

/// A cached prediction with its freshness window.
///
/// Expiry is decided at read time: an entry is live strictly before
/// `expires_at` and absent from then on, whether or not a sweep has
/// physically removed it yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Value,
    /// When the prediction was produced. Newer wins on conflicting
    /// writes to the same key.
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether this entry is expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
