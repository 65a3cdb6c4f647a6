use crate::cache::RedisClient;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

/// JSON cache over Redis with a key prefix.
///
/// Never fails: when Redis is down or a command errors, reads miss and writes report `false`.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    prefix: String,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self::with_prefix(redis, "app")
    }

    pub fn with_prefix(redis: RedisClient, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.redis.connection().await?;

        let raw: Option<String> = match conn.get(self.key(key)).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("⚠️  Cache get error for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("⚠️  Cache entry {} is not valid JSON: {}", key, e);
                None
            }
        }
    }

    /// Stores `value` as JSON. A `ttl` of `None` or zero stores without expiry.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> bool {
        let Some(mut conn) = self.redis.connection().await else {
            return false;
        };

        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("⚠️  Cache set error for {}: {}", key, e);
                return false;
            }
        };

        let result: redis::RedisResult<()> = match ttl_seconds.filter(|ttl| *ttl > 0) {
            Some(ttl) => conn.set_ex(self.key(key), serialized, ttl).await,
            None => conn.set(self.key(key), serialized).await,
        };

        result
            .map_err(|e| log::warn!("⚠️  Cache set error for {}: {}", key, e))
            .is_ok()
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(mut conn) = self.redis.connection().await else {
            return false;
        };

        let result: redis::RedisResult<i64> = conn.del(self.key(key)).await;
        result
            .map_err(|e| log::warn!("⚠️  Cache delete error for {}: {}", key, e))
            .is_ok()
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(mut conn) = self.redis.connection().await else {
            return false;
        };

        let result: redis::RedisResult<bool> = conn.exists(self.key(key)).await;
        result.unwrap_or_else(|e| {
            log::warn!("⚠️  Cache exists error for {}: {}", key, e);
            false
        })
    }

    /// Atomically adds `amount` and returns the new value.
    pub async fn increment(&self, key: &str, amount: i64) -> Option<i64> {
        let mut conn = self.redis.connection().await?;

        let result: redis::RedisResult<i64> = conn.incr(self.key(key), amount).await;
        result
            .map_err(|e| log::warn!("⚠️  Cache increment error for {}: {}", key, e))
            .ok()
    }

    pub async fn expire(&self, key: &str, seconds: u64) -> bool {
        let Some(mut conn) = self.redis.connection().await else {
            return false;
        };

        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        let result: redis::RedisResult<bool> = conn.expire(self.key(key), seconds).await;
        result
            .map_err(|e| log::warn!("⚠️  Cache expire error for {}: {}", key, e))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_prefixed() {
        let cache = CacheService::new(RedisClient::disconnected());
        assert_eq!(cache.key("user:42"), "app:user:42");

        let limits = CacheService::with_prefix(RedisClient::disconnected(), "ratelimit");
        assert_eq!(limits.key("1.2.3.4"), "ratelimit:1.2.3.4");
    }

    #[tokio::test]
    async fn test_degrades_without_redis() {
        let cache = CacheService::new(RedisClient::disconnected());

        assert!(!cache.set("k", &serde_json::json!({"a": 1}), Some(60)).await);
        assert_eq!(cache.get::<serde_json::Value>("k").await, None);
        assert!(!cache.exists("k").await);
        assert!(!cache.delete("k").await);
        assert_eq!(cache.increment("counter", 1).await, None);
        assert!(!cache.expire("counter", 10).await);
    }
}
