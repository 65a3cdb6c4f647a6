//! In-process user store for handler and use-case tests.

use crate::domain::{User, UserRepository, UserRole};
use crate::utils::{AppError, AppResult, PaginatedResponse, PaginationMeta, PaginationParams};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<(User, String)>>,
}

impl InMemoryUserRepository {
    fn with_users<R>(&self, f: impl FnOnce(&mut Vec<(User, String)>) -> R) -> R {
        let mut users = self.users.lock().unwrap();
        f(&mut users)
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<(User, String)> {
        self.with_users(|users| users.iter().find(|(u, _)| pred(u)).cloned())
    }

    fn taken(users: &[(User, String)], user: &User) -> bool {
        users.iter().any(|(other, _)| {
            other.id != user.id
                && ((user.email.is_some() && other.email == user.email)
                    || (user.phone.is_some() && other.phone == user.phone))
        })
    }

    fn paginate(&self, pred: impl Fn(&User) -> bool, pagination: PaginationParams) -> PaginatedResponse<User> {
        let mut matching: Vec<User> = self.with_users(|users| {
            users
                .iter()
                .filter(|(u, _)| pred(u))
                .map(|(u, _)| u.clone())
                .collect()
        });
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.skip() as usize)
            .take(pagination.limit() as usize)
            .collect();

        PaginatedResponse {
            items,
            meta: PaginationMeta::create(total, pagination.page, pagination.page_size),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, mut user: User, password_hash: &str) -> AppResult<User> {
        user.id = Some(ObjectId::new().to_hex());
        user.created_at = Utc::now();
        user.updated_at = None;

        self.with_users(|users| {
            if Self::taken(users.as_slice(), &user) {
                return Err(AppError::conflict(
                    "User with this email or phone already exists",
                    "user",
                ));
            }
            users.push((user.clone(), password_hash.to_string()));
            Ok(user)
        })
    }

    async fn get_by_id(&self, user_id: &str) -> AppResult<Option<User>> {
        Ok(self.find(|u| u.id.as_deref() == Some(user_id)).map(|(u, _)| u))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.find(|u| u.email.as_deref() == Some(email)).map(|(u, _)| u))
    }

    async fn get_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        Ok(self.find(|u| u.phone.as_deref() == Some(phone)).map(|(u, _)| u))
    }

    async fn get_by_email_with_password(&self, email: &str) -> AppResult<Option<(User, String)>> {
        Ok(self.find(|u| u.email.as_deref() == Some(email)))
    }

    async fn get_by_phone_with_password(&self, phone: &str) -> AppResult<Option<(User, String)>> {
        Ok(self.find(|u| u.phone.as_deref() == Some(phone)))
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        self.with_users(|users| {
            if Self::taken(users.as_slice(), user) {
                return Err(AppError::conflict(
                    "User with this email or phone already exists",
                    "user",
                ));
            }
            let (stored, _) = users
                .iter_mut()
                .find(|(u, _)| u.id.is_some() && u.id == user.id)
                .ok_or_else(|| AppError::not_found("User not found", "user"))?;

            stored.email = user.email.clone();
            stored.phone = user.phone.clone();
            stored.role = user.role;
            stored.is_active = user.is_active;
            stored.updated_at = Some(Utc::now());
            Ok(stored.clone())
        })
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> AppResult<bool> {
        Ok(self.with_users(|users| {
            match users.iter_mut().find(|(u, _)| u.id.as_deref() == Some(user_id)) {
                Some((user, hash)) => {
                    *hash = password_hash.to_string();
                    user.updated_at = Some(Utc::now());
                    true
                }
                None => false,
            }
        }))
    }

    async fn deactivate(&self, user: &User) -> AppResult<User> {
        let deactivated = User {
            is_active: false,
            ..user.clone()
        };
        self.update(&deactivated).await
    }

    async fn list_active(&self, pagination: PaginationParams) -> AppResult<PaginatedResponse<User>> {
        Ok(self.paginate(|u| u.is_active, pagination))
    }

    async fn list_by_role(
        &self,
        role: UserRole,
        pagination: PaginationParams,
    ) -> AppResult<PaginatedResponse<User>> {
        Ok(self.paginate(|u| u.is_active && u.role == role, pagination))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
