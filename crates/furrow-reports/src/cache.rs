//! Query cache for report lists and details.

use crate::Report;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry<T> {
    /// `None` when the stale time is too large to represent.
    expires_at: Option<Instant>,
    value: T,
}

impl<T: Clone> Entry<T> {
    fn fresh_value(&self, now: Instant) -> Option<T> {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => None,
            _ => Some(self.value.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    /// User the cached entries were read for.
    owner: Option<String>,
    lists: HashMap<String, Entry<Vec<Report>>>,
    /// Keyed by `(user_id, report_id)`.
    details: HashMap<(String, String), Entry<Report>>,
}

/// List entries are keyed by user id, detail entries by owner and report
/// id. Both expire after the same stale time.
#[derive(Debug)]
pub struct ReportCache {
    ttl: Duration,
    entries: Mutex<Entries>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Entries::default()),
        }
    }

    fn expiry(&self, now: Instant) -> Option<Instant> {
        now.checked_add(self.ttl)
    }

    /// Drop everything when the signed-in user differs from the one the
    /// cache was filled for.
    pub fn scope_to(&self, user_id: &str) {
        let mut entries = self.entries.lock();
        if entries.owner.as_deref() == Some(user_id) {
            return;
        }
        if entries.owner.is_some() {
            debug!(user_id, "Session user changed, clearing report cache");
        }
        entries.lists.clear();
        entries.details.clear();
        entries.owner = Some(user_id.to_string());
    }

    pub fn get_list(&self, user_id: &str, now: Instant) -> Option<Vec<Report>> {
        let mut entries = self.entries.lock();
        let value = entries.lists.get(user_id)?.fresh_value(now);
        if value.is_none() {
            entries.lists.remove(user_id);
        }
        value
    }

    pub fn put_list(&self, user_id: &str, reports: Vec<Report>, now: Instant) {
        let expires_at = self.expiry(now);
        self.entries.lock().lists.insert(
            user_id.to_string(),
            Entry {
                expires_at,
                value: reports,
            },
        );
    }

    pub fn get_detail(&self, user_id: &str, report_id: &str, now: Instant) -> Option<Report> {
        let key = (user_id.to_string(), report_id.to_string());
        let mut entries = self.entries.lock();
        let value = entries.details.get(&key)?.fresh_value(now);
        if value.is_none() {
            entries.details.remove(&key);
        }
        value
    }

    /// Cache a report under its owner.
    pub fn put_detail(&self, report: Report, now: Instant) {
        let expires_at = self.expiry(now);
        self.entries.lock().details.insert(
            (report.user_id.clone(), report.id.clone()),
            Entry {
                expires_at,
                value: report,
            },
        );
    }

    /// Drop every cached list.
    pub fn invalidate_lists(&self) {
        self.entries.lock().lists.clear();
    }

    pub fn invalidate_detail(&self, user_id: &str, report_id: &str) {
        self.entries
            .lock()
            .details
            .remove(&(user_id.to_string(), report_id.to_string()));
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.lists.clear();
        entries.details.clear();
        entries.owner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn report(id: &str, user_id: &str) -> Report {
        let now = Utc::now();
        Report {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expenses: vec![],
            labels: vec![],
            total: 0.0,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_list_entry_expires() {
        let now = Instant::now();
        let cache = ReportCache::new(Duration::from_secs(5));
        cache.put_list("u1", vec![report("r1", "u1")], now);

        assert_eq!(cache.get_list("u1", now + Duration::from_secs(4)).unwrap().len(), 1);
        assert!(cache.get_list("u1", now + Duration::from_secs(5)).is_none());
        assert!(cache.get_list("u1", now).is_none());
    }

    #[test]
    fn test_huge_stale_time_never_expires() {
        let now = Instant::now();
        let cache = ReportCache::new(Duration::from_secs(u64::MAX));
        cache.put_list("u1", vec![report("r1", "u1")], now);
        cache.put_detail(report("r1", "u1"), now);

        assert!(cache.get_list("u1", now + Duration::from_secs(3600)).is_some());
        assert!(cache.get_detail("u1", "r1", now).is_some());
    }

    #[test]
    fn test_invalidate_lists_keeps_details() {
        let now = Instant::now();
        let cache = ReportCache::new(Duration::from_secs(60));
        cache.put_list("u1", vec![report("r1", "u1")], now);
        cache.put_list("u2", vec![], now);
        cache.put_detail(report("r1", "u1"), now);

        cache.invalidate_lists();

        assert!(cache.get_list("u1", now).is_none());
        assert!(cache.get_list("u2", now).is_none());
        assert!(cache.get_detail("u1", "r1", now).is_some());
    }

    #[test]
    fn test_details_are_keyed_by_owner() {
        let now = Instant::now();
        let cache = ReportCache::new(Duration::from_secs(60));
        cache.put_detail(report("r1", "u1"), now);

        assert!(cache.get_detail("u1", "r1", now).is_some());
        assert!(cache.get_detail("u2", "r1", now).is_none());
    }

    #[test]
    fn test_invalidate_detail() {
        let now = Instant::now();
        let cache = ReportCache::new(Duration::from_secs(60));
        cache.put_detail(report("r1", "u1"), now);
        cache.put_detail(report("r2", "u1"), now);

        cache.invalidate_detail("u1", "r1");

        assert!(cache.get_detail("u1", "r1", now).is_none());
        assert!(cache.get_detail("u1", "r2", now).is_some());

        cache.clear();
        assert!(cache.get_detail("u1", "r2", now).is_none());
    }

    #[test]
    fn test_scope_to_new_user_clears_entries() {
        let now = Instant::now();
        let cache = ReportCache::new(Duration::from_secs(60));
        cache.scope_to("u1");
        cache.put_list("u1", vec![report("r1", "u1")], now);
        cache.put_detail(report("r1", "u1"), now);

        cache.scope_to("u1");
        assert!(cache.get_list("u1", now).is_some());

        cache.scope_to("u2");
        assert!(cache.get_list("u1", now).is_none());
        assert!(cache.get_detail("u1", "r1", now).is_none());
    }
}
