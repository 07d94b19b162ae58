//! Short-horizon scan deduplication.
//!
//! Keyed by (child, facility-local day), an entry suppresses a repeat scan of
//! the same child inside the cooldown window. Entries are overwritten on
//! every committed transition and purged by a periodic sweep, so memory stays
//! bounded by the number of children active within one window. The cache is a
//! safety net against accidental double-scans; the conditional ledger writes
//! in `db::repo` are what make transitions race-safe.

use crate::model::ScanAction;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    last_action: ScanAction,
    at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ActionCache {
    cooldown: Duration,
    entries: Mutex<HashMap<(i64, NaiveDate), CacheEntry>>,
}

impl ActionCache {
    pub fn new(cooldown: std::time::Duration) -> Self {
        Self {
            cooldown: Duration::from_std(cooldown).expect("cooldown fits chrono::Duration"),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// True if a transition for this child/day was committed less than one
    /// cooldown ago.
    pub fn should_reject(&self, child_id: i64, day: NaiveDate, now: DateTime<Utc>) -> bool {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(&(child_id, day)) {
            Some(entry) => now - entry.at < self.cooldown,
            None => false,
        }
    }

    /// Remember a committed transition. A prior entry for the same key is
    /// overwritten; only the most recent action matters.
    pub fn record(&self, child_id: i64, day: NaiveDate, action: ScanAction, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            (child_id, day),
            CacheEntry {
                last_action: action,
                at: now,
            },
        );
    }

    /// The action most recently recorded for this child/day, if any entry is
    /// still live.
    pub fn last_action(&self, child_id: i64, day: NaiveDate) -> Option<ScanAction> {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        entries.get(&(child_id, day)).map(|e| e.last_action)
    }

    /// Drop entries older than the cooldown. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now - entry.at < self.cooldown);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the sweep at a fixed interval as an owned background task. The handle
/// is dropped-or-kept by the caller; aborting it stops the sweeper.
pub fn spawn_sweeper(cache: Arc<ActionCache>, interval: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.sweep(Utc::now());
            if removed > 0 {
                debug!(removed, "swept expired scan entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    const COOLDOWN: StdDuration = StdDuration::from_secs(300);

    fn cache() -> ActionCache {
        ActionCache::new(COOLDOWN)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn rejects_within_cooldown_only() {
        let cache = cache();
        cache.record(1, day(), ScanAction::CheckIn, at(0));

        assert!(cache.should_reject(1, day(), at(0)));
        assert!(cache.should_reject(1, day(), at(299)));
        // Exactly one cooldown later the scan is allowed again.
        assert!(!cache.should_reject(1, day(), at(300)));
    }

    #[test]
    fn unknown_key_is_not_rejected() {
        let cache = cache();
        cache.record(1, day(), ScanAction::CheckIn, at(0));
        assert!(!cache.should_reject(2, day(), at(1)));
    }

    #[test]
    fn record_overwrites_prior_entry() {
        let cache = cache();
        cache.record(1, day(), ScanAction::CheckIn, at(0));
        cache.record(1, day(), ScanAction::PickUp, at(400));

        assert_eq!(cache.last_action(1, day()), Some(ScanAction::PickUp));
        assert_eq!(cache.len(), 1);
        // Window restarts from the newest timestamp.
        assert!(cache.should_reject(1, day(), at(500)));
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let cache = cache();
        cache.record(1, day(), ScanAction::CheckIn, at(0));
        cache.record(2, day(), ScanAction::CheckIn, at(200));

        let removed = cache.sweep(at(350));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.last_action(2, day()), Some(ScanAction::CheckIn));
    }

    #[test]
    fn sweep_on_empty_cache_is_noop() {
        let cache = cache();
        assert_eq!(cache.sweep(at(0)), 0);
        assert!(cache.is_empty());
    }
}
