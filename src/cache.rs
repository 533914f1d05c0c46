use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{AvailabilityError, Result};

/// Every key the engine writes starts with this
pub const KEY_ROOT: &str = "availability:";

/// Key/value store holding serialized availability results
#[async_trait]
pub trait AvailabilityCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Drops every key starting with `prefix`, returning how many went
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize>;

    /// Token to read before computing a value for `key`
    async fn generation(&self, _key: &str) -> Result<u64> {
        Ok(0)
    }

    /// Stores `value` unless an invalidation covering `key` ran after
    /// `generation` was read. Returns whether the value was stored.
    async fn set_if_current(&self, key: &str, value: String, ttl: Duration, _generation: u64) -> Result<bool> {
        self.set(key, value, ttl).await?;
        Ok(true)
    }
}

/// Prefix covering every monthly and daily entry of one month
pub fn month_prefix(year: i32, month: u32) -> String {
    format!("{}{:04}-{:02}:", KEY_ROOT, year, month)
}

/// Deterministic key: month bucket, query scope, then the parameters in
/// sorted order
pub fn cache_key(year: i32, month: u32, scope: &str, params: &BTreeMap<&str, String>) -> String {
    let serialized: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}{}:{}", month_prefix(year, month), scope, serialized.join("&"))
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn AvailabilityCache, key: &str) -> Result<Option<T>> {
    match cache.get(key).await? {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| AvailabilityError::Cache(format!("corrupt entry {}: {}", key, e))),
        None => Ok(None),
    }
}

/// Serializes and stores `value` if `key` was not invalidated since
/// `generation` was read
pub async fn set_json<T: Serialize>(
    cache: &dyn AvailabilityCache,
    key: &str,
    value: &T,
    ttl: Duration,
    generation: u64,
) -> Result<bool> {
    let json = serde_json::to_string(value).map_err(|e| AvailabilityError::Cache(e.to_string()))?;
    cache.set_if_current(key, json, ttl, generation).await
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    // Bumped by every invalidation
    generation: u64,
    // prefix -> generation of its latest invalidation
    invalidated: HashMap<String, u64>,
}

impl CacheState {
    fn invalidated_since(&self, key: &str, generation: u64) -> bool {
        self.invalidated
            .iter()
            .any(|(prefix, at)| *at > generation && key.starts_with(prefix.as_str()))
    }

    fn insert(&mut self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }
}

/// Process-local TTL cache
#[derive(Debug, Default)]
pub struct InMemoryCache {
    state: RwLock<CacheState>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.state.read().await.entries.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AvailabilityCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.state.write().await.insert(key, value, ttl);
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        state.generation += 1;
        let generation = state.generation;
        state.invalidated.insert(prefix.to_string(), generation);

        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - state.entries.len())
    }

    async fn generation(&self, _key: &str) -> Result<u64> {
        Ok(self.state.read().await.generation)
    }

    async fn set_if_current(&self, key: &str, value: String, ttl: Duration, generation: u64) -> Result<bool> {
        // Checked under the write lock so no invalidation slips in between
        let mut state = self.state.write().await;
        if state.invalidated_since(key, generation) {
            return Ok(false);
        }
        state.insert(key, value, ttl);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&'static str, &str)]) -> BTreeMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn keys_do_not_depend_on_parameter_order() {
        let a = cache_key(2026, 11, "month", &params(&[("planType", "DIY"), ("numberOfUnits", "2")]));
        let b = cache_key(2026, 11, "month", &params(&[("numberOfUnits", "2"), ("planType", "DIY")]));
        assert_eq!(a, b);
        assert_eq!(a, "availability:2026-11:month:numberOfUnits=2&planType=DIY");
        assert!(a.starts_with(&month_prefix(2026, 11)));
        assert!(!a.starts_with(&month_prefix(2026, 1)));
    }

    #[tokio::test]
    async fn stores_and_expires_entries() {
        let cache = InMemoryCache::new();
        cache.set("availability:a", "1".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("availability:b", "2".to_string(), Duration::from_millis(10)).await.unwrap();
        assert_eq!(cache.get("availability:a").await.unwrap().as_deref(), Some("1"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("availability:b").await.unwrap(), None);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn prefix_invalidation_spares_other_months() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        let november = cache_key(2026, 11, "month", &params(&[("planType", "DIY")]));
        let november_day = cache_key(2026, 11, "date", &params(&[("date", "2026-11-03")]));
        let december = cache_key(2026, 12, "month", &params(&[("planType", "DIY")]));
        for key in [&november, &november_day, &december] {
            cache.set(key, "{}".to_string(), ttl).await.unwrap();
        }

        assert_eq!(cache.invalidate_prefix(&month_prefix(2026, 11)).await.unwrap(), 2);
        assert_eq!(cache.get(&november).await.unwrap(), None);
        assert_eq!(cache.get(&november_day).await.unwrap(), None);
        assert!(cache.get(&december).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn json_helpers_round_trip_and_flag_corruption() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        assert!(set_json(&cache, "availability:x", &vec![1, 2, 3], ttl, 0).await.unwrap());
        let back: Option<Vec<i32>> = get_json(&cache, "availability:x").await.unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        cache.set("availability:y", "not json".to_string(), ttl).await.unwrap();
        let err = get_json::<Vec<i32>>(&cache, "availability:y").await.unwrap_err();
        assert_eq!(err.kind(), "CacheError");
    }

    #[tokio::test]
    async fn writes_started_before_an_invalidation_are_dropped() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        let november = cache_key(2026, 11, "date", &params(&[("date", "2026-11-02")]));
        let december = cache_key(2026, 12, "date", &params(&[("date", "2026-12-07")]));

        let november_gen = cache.generation(&november).await.unwrap();
        let december_gen = cache.generation(&december).await.unwrap();
        cache.invalidate_prefix(&month_prefix(2026, 11)).await.unwrap();

        assert!(!cache.set_if_current(&november, "stale".to_string(), ttl, november_gen).await.unwrap());
        assert_eq!(cache.get(&november).await.unwrap(), None);
        assert!(cache.set_if_current(&december, "{}".to_string(), ttl, december_gen).await.unwrap());

        let fresh_gen = cache.generation(&november).await.unwrap();
        assert!(cache.set_if_current(&november, "fresh".to_string(), ttl, fresh_gen).await.unwrap());
        assert_eq!(cache.get(&november).await.unwrap().as_deref(), Some("fresh"));

        cache.invalidate_prefix(KEY_ROOT).await.unwrap();
        assert!(!cache.set_if_current(&december, "{}".to_string(), ttl, fresh_gen).await.unwrap());
    }
}
