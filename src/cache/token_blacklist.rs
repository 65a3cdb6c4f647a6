use crate::cache::{CacheService, RedisClient};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Revoked token ids, kept until the token would have expired anyway.
///
/// Entries go to Redis under `token:blacklist:<jti>`. While Redis is unavailable
/// they are held in process memory instead.
#[derive(Clone)]
pub struct TokenBlacklist {
    cache: CacheService,
    fallback: Arc<Mutex<HashMap<String, Instant>>>,
}

impl TokenBlacklist {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            cache: CacheService::with_prefix(redis, "token"),
            fallback: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key(jti: &str) -> String {
        format!("blacklist:{}", jti)
    }

    /// Revokes `jti` until the unix timestamp `expires_at`. Already-expired tokens are ignored.
    pub async fn revoke(&self, jti: &str, expires_at: usize) {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        let Some(remaining) = expires_at.checked_sub(now).filter(|secs| *secs > 0) else {
            return;
        };

        if self.cache.set(&Self::key(jti), &true, Some(remaining as u64)).await {
            return;
        }

        if let Ok(mut fallback) = self.fallback.lock() {
            fallback.insert(
                jti.to_string(),
                Instant::now() + Duration::from_secs(remaining as u64),
            );
            log::debug!("💾 Token {} revoked in memory ({}s)", jti, remaining);
        }
    }

    pub async fn is_revoked(&self, jti: &str) -> bool {
        let in_memory = self
            .fallback
            .lock()
            .map(|fallback| {
                fallback
                    .get(jti)
                    .is_some_and(|deadline| *deadline > Instant::now())
            })
            .unwrap_or(false);

        in_memory || self.cache.exists(&Self::key(jti)).await
    }

    /// Drops in-memory entries whose tokens have expired. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut fallback) = self.fallback.lock() else {
            return 0;
        };

        let now = Instant::now();
        let before = fallback.len();
        fallback.retain(|_, deadline| *deadline > now);
        before - fallback.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blacklist() -> TokenBlacklist {
        TokenBlacklist::new(RedisClient::disconnected())
    }

    fn in_seconds(secs: i64) -> usize {
        (chrono::Utc::now().timestamp() + secs) as usize
    }

    #[tokio::test]
    async fn test_revoked_token_is_remembered_without_redis() {
        let blacklist = blacklist();
        blacklist.revoke("jti-1", in_seconds(600)).await;

        assert!(blacklist.is_revoked("jti-1").await);
        assert!(!blacklist.is_revoked("jti-2").await);
    }

    #[tokio::test]
    async fn test_expired_tokens_are_not_stored() {
        let blacklist = blacklist();
        blacklist.revoke("old", in_seconds(-10)).await;

        assert!(!blacklist.is_revoked("old").await);
        assert_eq!(blacklist.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_purge_removes_only_elapsed_entries() {
        let blacklist = blacklist();
        blacklist.revoke("live", in_seconds(600)).await;
        blacklist
            .fallback
            .lock()
            .unwrap()
            .insert("elapsed".into(), Instant::now() - Duration::from_secs(1));

        assert_eq!(blacklist.purge_expired(), 1);
        assert!(blacklist.is_revoked("live").await);
    }
}
