use spendwatch_core::config::RunMode;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub mode: RunMode,
    pub days: u32,
    pub budget_cents: i64,
    pub accounts: String,
}

impl SummaryKey {
    pub fn new(mode: RunMode, days: u32, budget: f64, accounts: &str) -> Self {
        Self {
            mode,
            days,
            budget_cents: (budget * 100.0).round() as i64,
            accounts: accounts.trim().to_string(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    payload: Arc<serde_json::Value>,
}

#[derive(Debug)]
pub struct SummaryCache {
    ttl: Duration,
    entries: RwLock<HashMap<SummaryKey, Entry>>,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &SummaryKey) -> Option<Arc<serde_json::Value>> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: SummaryKey, payload: serde_json::Value) -> Arc<serde_json::Value> {
        self.insert_at(key, payload, Instant::now())
    }

    fn get_at(&self, key: &SummaryKey, now: Instant) -> Option<Arc<serde_json::Value>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if now.duration_since(entry.stored_at) >= self.ttl {
            return None;
        }
        tracing::debug!(mode = key.mode.as_str(), days = key.days, "summary cache hit");
        Some(Arc::clone(&entry.payload))
    }

    fn insert_at(
        &self,
        key: SummaryKey,
        payload: serde_json::Value,
        now: Instant,
    ) -> Arc<serde_json::Value> {
        let payload = Arc::new(payload);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.stored_at) < self.ttl);
        if entries.len() < before {
            tracing::debug!(pruned = before - entries.len(), "expired summaries pruned");
        }
        entries.insert(
            key,
            Entry {
                stored_at: now,
                payload: Arc::clone(&payload),
            },
        );
        payload
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(days: u32) -> SummaryKey {
        SummaryKey::new(RunMode::Demo, days, 1000.0, "default:default")
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = SummaryCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at(key(7), json!({"totals": {"total_spend": 1.0}}), t0);

        assert!(cache.get_at(&key(7), t0 + Duration::from_secs(59)).is_some());
        assert!(cache.get_at(&key(7), t0 + Duration::from_secs(60)).is_none());
        assert!(cache.get_at(&key(14), t0).is_none());
    }

    #[test]
    fn insert_prunes_expired_entries() {
        let cache = SummaryCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at(key(7), json!(1), t0);
        cache.insert_at(key(14), json!(2), t0 + Duration::from_secs(30));
        assert_eq!(cache.len(), 2);

        cache.insert_at(key(30), json!(3), t0 + Duration::from_secs(61));
        assert_eq!(cache.len(), 2);
        assert!(cache
            .get_at(&key(14), t0 + Duration::from_secs(61))
            .is_some());
    }

    #[test]
    fn budget_is_keyed_in_cents() {
        assert_eq!(
            SummaryKey::new(RunMode::Live, 7, 1000.001, " prod "),
            SummaryKey::new(RunMode::Live, 7, 1000.0, "prod")
        );
        assert_ne!(
            SummaryKey::new(RunMode::Live, 7, 1000.01, "prod"),
            SummaryKey::new(RunMode::Live, 7, 1000.0, "prod")
        );
    }
}
