use crate::domain::{User, UserRepository, UserRole};
use crate::utils::{AppError, AppResult, PaginatedResponse, PaginationParams};
use std::sync::Arc;

/// Field changes for [`UserService::update_user`]. `None` leaves a field untouched.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

/// User use cases over the repository port.
#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Creates an active user. Email and phone must each be unused.
    pub async fn create_user(
        &self,
        email: Option<String>,
        phone: Option<String>,
        password_hash: &str,
        role: UserRole,
    ) -> AppResult<User> {
        if email.is_none() && phone.is_none() {
            return Err(AppError::validation(
                "Email or phone is required",
                "email_or_phone",
            ));
        }

        if let Some(email) = &email {
            if self.get_by_email(email).await?.is_some() {
                return Err(AppError::conflict("User with this email already exists", "user")
                    .with_detail("email", email.clone()));
            }
        }

        if let Some(phone) = &phone {
            if self.get_by_phone(phone).await?.is_some() {
                return Err(AppError::conflict("User with this phone already exists", "user")
                    .with_detail("phone", phone.clone()));
            }
        }

        let user = self
            .repository
            .create(User::new(email, phone, role), password_hash)
            .await?;

        log::info!("👤 User created: {} ({})", user.id_str(), user.role);
        Ok(user)
    }

    pub async fn get_by_id(&self, user_id: &str) -> AppResult<Option<User>> {
        self.repository.get_by_id(user_id).await
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.repository.get_by_email(email).await
    }

    pub async fn get_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        self.repository.get_by_phone(phone).await
    }

    /// Applies the given changes and persists. A new email or phone must not belong to another user.
    pub async fn update_user(&self, mut user: User, changes: UserChanges) -> AppResult<User> {
        if let Some(email) = changes.email {
            if user.email.as_deref() != Some(email.as_str()) {
                if let Some(other) = self.get_by_email(&email).await? {
                    if other.id != user.id {
                        return Err(AppError::conflict("User with this email already exists", "user")
                            .with_detail("email", email));
                    }
                }
            }
            user.email = Some(email);
        }

        if let Some(phone) = changes.phone {
            if user.phone.as_deref() != Some(phone.as_str()) {
                if let Some(other) = self.get_by_phone(&phone).await? {
                    if other.id != user.id {
                        return Err(AppError::conflict("User with this phone already exists", "user")
                            .with_detail("phone", phone));
                    }
                }
            }
            user.phone = Some(phone);
        }

        if let Some(role) = changes.role {
            user.role = role;
        }

        user.updated_at = Some(chrono::Utc::now());
        self.repository.update(&user).await
    }

    /// Soft delete
    pub async fn deactivate_user(&self, user: &User) -> AppResult<User> {
        let user = self.repository.deactivate(user).await?;
        log::info!("👤 User deactivated: {}", user.id_str());
        Ok(user)
    }

    /// Active users, optionally restricted to one role.
    pub async fn list_users(
        &self,
        role: Option<UserRole>,
        pagination: PaginationParams,
    ) -> AppResult<PaginatedResponse<User>> {
        match role {
            Some(role) => self.repository.list_by_role(role, pagination).await,
            None => self.repository.list_active(pagination).await,
        }
    }
}
