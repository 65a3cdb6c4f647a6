use crate::cache::CacheService;
use crate::domain::{User, UserRepository, UserRole};
use crate::utils::{AppResult, PaginatedResponse, PaginationParams};
use async_trait::async_trait;
use std::sync::Arc;

/// Read-through cache for user lookups by id.
///
/// Every write that goes through this repository evicts the cached entry.
pub struct CachedUserRepository {
    inner: Arc<dyn UserRepository>,
    cache: CacheService,
    ttl_seconds: u64,
}

impl CachedUserRepository {
    pub fn new(inner: Arc<dyn UserRepository>, cache: CacheService, ttl_seconds: u64) -> Self {
        Self {
            inner,
            cache,
            ttl_seconds,
        }
    }

    fn key(user_id: &str) -> String {
        format!("user:{}", user_id)
    }

    async fn evict(&self, user_id: &str) {
        self.cache.delete(&Self::key(user_id)).await;
    }
}

#[async_trait]
impl UserRepository for CachedUserRepository {
    async fn create(&self, user: User, password_hash: &str) -> AppResult<User> {
        self.inner.create(user, password_hash).await
    }

    async fn get_by_id(&self, user_id: &str) -> AppResult<Option<User>> {
        let key = Self::key(user_id);
        if let Some(user) = self.cache.get::<User>(&key).await {
            log::debug!("📦 Cache hit for {}", key);
            return Ok(Some(user));
        }

        let user = self.inner.get_by_id(user_id).await?;
        if let Some(found) = &user {
            self.cache.set(&key, found, Some(self.ttl_seconds)).await;
        }
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.inner.get_by_email(email).await
    }

    async fn get_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        self.inner.get_by_phone(phone).await
    }

    async fn get_by_email_with_password(&self, email: &str) -> AppResult<Option<(User, String)>> {
        self.inner.get_by_email_with_password(email).await
    }

    async fn get_by_phone_with_password(&self, phone: &str) -> AppResult<Option<(User, String)>> {
        self.inner.get_by_phone_with_password(phone).await
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let updated = self.inner.update(user).await?;
        self.evict(user.id_str()).await;
        Ok(updated)
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> AppResult<bool> {
        let updated = self.inner.update_password(user_id, password_hash).await?;
        self.evict(user_id).await;
        Ok(updated)
    }

    async fn deactivate(&self, user: &User) -> AppResult<User> {
        let deactivated = self.inner.deactivate(user).await?;
        self.evict(user.id_str()).await;
        Ok(deactivated)
    }

    async fn list_active(&self, pagination: PaginationParams) -> AppResult<PaginatedResponse<User>> {
        self.inner.list_active(pagination).await
    }

    async fn list_by_role(
        &self,
        role: UserRole,
        pagination: PaginationParams,
    ) -> AppResult<PaginatedResponse<User>> {
        self.inner.list_by_role(role, pagination).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RedisClient;
    use crate::database::memory::InMemoryUserRepository;

    fn repository() -> CachedUserRepository {
        CachedUserRepository::new(
            Arc::new(InMemoryUserRepository::default()),
            CacheService::new(RedisClient::disconnected()),
            60,
        )
    }

    #[tokio::test]
    async fn test_passes_through_when_cache_is_down() {
        let repo = repository();
        let created = repo
            .create(User::new(Some("a@b.com".into()), None, UserRole::Student), "hash")
            .await
            .unwrap();

        let found = repo.get_by_id(created.id_str()).await.unwrap().unwrap();
        assert_eq!(found.email.as_deref(), Some("a@b.com"));

        let mut changed = found.clone();
        changed.email = Some("new@b.com".into());
        repo.update(&changed).await.unwrap();

        let reread = repo.get_by_id(created.id_str()).await.unwrap().unwrap();
        assert_eq!(reread.email.as_deref(), Some("new@b.com"));
    }
}
