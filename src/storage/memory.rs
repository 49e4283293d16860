use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::trait_def::{KeyValueStore, StorageResult};

/// A stored value with its absolute expiry (Unix seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// In-memory store used for session storage and for simulated visitors.
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Rebuild a store from a snapshot, dropping entries that already expired.
    pub fn restore(snapshot: BTreeMap<String, StoredValue>) -> Self {
        let now = chrono::Utc::now().timestamp();
        let entries = snapshot
            .into_iter()
            .filter(|(_, stored)| !is_expired(stored, now))
            .collect();
        Self { entries }
    }

    pub fn snapshot(&self) -> BTreeMap<String, StoredValue> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(stored: &StoredValue, now: i64) -> bool {
    stored.expires_at.is_some_and(|at| at <= now)
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let now = chrono::Utc::now().timestamp();
        let value = self.entries.get(key).and_then(|entry| {
            if is_expired(entry.value(), now) {
                None
            } else {
                Some(entry.value().value.clone())
            }
        });

        if value.is_none() {
            self.entries.remove_if(key, |_, stored| is_expired(stored, now));
        }

        Ok(value)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()> {
        // TTLs past the representable range never expire.
        let expires_at = ttl.and_then(|ttl| {
            let secs = i64::try_from(ttl.as_secs()).ok()?;
            chrono::Utc::now().timestamp().checked_add(secs)
        });
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1", None).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.set("a", "2", Some(Duration::from_secs(60))).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "old".to_string(),
            StoredValue {
                value: "x".to_string(),
                expires_at: Some(chrono::Utc::now().timestamp() - 10),
            },
        );
        snapshot.insert(
            "fresh".to_string(),
            StoredValue {
                value: "y".to_string(),
                expires_at: None,
            },
        );

        let store = MemoryStore::restore(snapshot);
        assert_eq!(store.get("old").unwrap(), None);
        assert_eq!(store.get("fresh").unwrap().as_deref(), Some("y"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let store = MemoryStore::new();
        store.set("k", "v", Some(Duration::ZERO)).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let store = MemoryStore::new();
        store.set("max", "v", Some(Duration::MAX)).unwrap();
        store
            .set("edge", "v", Some(Duration::from_secs(i64::MAX as u64)))
            .unwrap();

        assert_eq!(store.get("max").unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("edge").unwrap().as_deref(), Some("v"));
        assert_eq!(store.snapshot()["max"].expires_at, None);
        assert_eq!(store.snapshot()["edge"].expires_at, None);
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let store = MemoryStore::new();
        store.set("_yldr_user_fq", "3", Some(Duration::from_secs(3600))).unwrap();

        let json = serde_json::to_string(&store.snapshot()).unwrap();
        let restored = MemoryStore::restore(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.get("_yldr_user_fq").unwrap().as_deref(), Some("3"));
    }
}
