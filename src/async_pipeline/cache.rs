//! The external status/result store the async pipeline writes job records
//! into, modeled as a trait with only an in-process default — durability of
//! async jobs beyond the process lifetime is a host concern.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

#[async_trait]
pub trait AsyncCache: Send + Sync {
    async fn set(&self, key: String, value: Value, ttl: Duration);
    async fn get(&self, key: &str) -> Option<Value>;
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// A `DashMap`-backed cache with lazy expiry: entries are only reaped when
/// touched by a `get`, matching the corpus's other in-memory stores rather
/// than running a separate sweep task.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AsyncCache for InMemoryCache {
    async fn set(&self, key: String, value: Value, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }
}

pub fn result_key(request_id: &str) -> String {
    format!("async:result:{request_id}")
}

pub fn status_key(request_id: &str) -> String {
    format!("async:status:{request_id}")
}

pub type SharedCache = Arc<dyn AsyncCache>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = InMemoryCache::new();
        cache
            .set("k".to_string(), serde_json::json!(1), Duration::from_millis(10))
            .await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!(1)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[test]
    fn keys_match_the_documented_scheme() {
        assert_eq!(result_key("R1"), "async:result:R1");
        assert_eq!(status_key("R1"), "async:status:R1");
    }
}
