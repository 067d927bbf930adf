//! Cache store - keyed JSON values with a time-to-live.
//!
//! Derived read models (the city list, a user's detailed bookings) are cached here
//! and invalidated by the core whenever the underlying rows change.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key of the city list.
pub const CITIES_LIST_KEY: &str = "cities_list";

/// Cache key of a user's detailed bookings listing.
#[must_use]
pub fn detailed_bookings_key(user_id: i64) -> String {
    format!("detailed_bookings:{user_id}")
}

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the live value for `key`, if any.
    async fn get(&self, key: &str) -> Option<Value>;
    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: Value, ttl: Duration);
    /// Drops `key`; missing keys are ignored.
    async fn invalidate(&self, key: &str);
}

/// Reads and deserializes a cached value.
///
/// An entry that no longer matches `T` is treated as a miss and dropped.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    let value = cache.get(key).await?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(key, error = %e, "Discarding undecodable cache entry");
            cache.invalidate(key).await;
            None
        }
    }
}

/// Serializes and stores a value.
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    cache.set(key, serde_json::to_value(value)?, ttl).await;
    Ok(())
}

/// In-process cache backed by a `HashMap`; expired entries are dropped on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if *expires_at > Instant::now() => {
                    return Some(value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().await.remove(key);
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, expires_at));
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
