//! Trash retention policy
//!
//! A trashed task expires 30 days after its `deleted_at` timestamp. Expiry
//! is computed lazily at read time: trash listings hide expired rows, but
//! storage is only reclaimed by an explicit purge or the `sweep` job.

use chrono::{DateTime, Duration, Utc};

/// Days a trashed task stays restorable before becoming purge-eligible.
pub const RETENTION_DAYS: i64 = 30;

pub fn expires_at(deleted_at: DateTime<Utc>) -> DateTime<Utc> {
    deleted_at + Duration::days(RETENTION_DAYS)
}

pub fn is_expired(deleted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at(deleted_at)
}

/// Whole days left before expiry, clamped to zero. Shown in the trash view.
pub fn days_remaining(deleted_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at(deleted_at) - now).num_days().max(0)
}
