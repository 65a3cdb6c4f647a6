use crate::domain::user::{User, UserRole};
use crate::utils::{AppResult, PaginatedResponse, PaginationParams};
use async_trait::async_trait;

/// Persistence contract for users. Implemented in the database layer.
///
/// Lookups by an id that is not a valid identifier return `Ok(None)`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persists a new user; stamps `created_at` and returns the stored entity with its id.
    async fn create(&self, user: User, password_hash: &str) -> AppResult<User>;

    async fn get_by_id(&self, user_id: &str) -> AppResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn get_by_phone(&self, phone: &str) -> AppResult<Option<User>>;

    /// User plus stored password hash, for authentication.
    async fn get_by_email_with_password(&self, email: &str) -> AppResult<Option<(User, String)>>;

    async fn get_by_phone_with_password(&self, phone: &str) -> AppResult<Option<(User, String)>>;

    /// Writes email, phone, role and active flag; stamps `updated_at`.
    async fn update(&self, user: &User) -> AppResult<User>;

    /// Returns `false` when no user matched.
    async fn update_password(&self, user_id: &str, password_hash: &str) -> AppResult<bool>;

    /// Soft delete
    async fn deactivate(&self, user: &User) -> AppResult<User>;

    /// Active users, newest first.
    async fn list_active(&self, pagination: PaginationParams) -> AppResult<PaginatedResponse<User>>;

    /// Active users with the given role, newest first.
    async fn list_by_role(
        &self,
        role: UserRole,
        pagination: PaginationParams,
    ) -> AppResult<PaginatedResponse<User>>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> AppResult<()>;
}
