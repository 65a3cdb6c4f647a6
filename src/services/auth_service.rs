use crate::cache::TokenBlacklist;
use crate::domain::{User, UserRepository, UserRole};
use crate::jobs::{Job, JobQueue};
use crate::security::{Claims, JwtService, PasswordHasher, TokenPair, TokenType};
use crate::services::user_service::{UserChanges, UserService};
use crate::utils::{AppError, AppResult};
use std::sync::Arc;

const MIN_PASSWORD_LEN: usize = 8;

fn user_not_found(user_id: &str) -> AppError {
    AppError::not_found("User not found", "user").with_detail("user_id", user_id)
}

/// Authentication use cases: registration, login, tokens, profile and account lifecycle.
#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    repository: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    jwt: JwtService,
    blacklist: TokenBlacklist,
    jobs: JobQueue,
}

impl AuthService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        hasher: PasswordHasher,
        jwt: JwtService,
        blacklist: TokenBlacklist,
        jobs: JobQueue,
    ) -> Self {
        Self {
            users: UserService::new(repository.clone()),
            repository,
            hasher,
            jwt,
            blacklist,
            jobs,
        }
    }

    /// Registers a student account.
    pub async fn register(
        &self,
        email: Option<String>,
        phone: Option<String>,
        password: &str,
    ) -> AppResult<User> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                "Password must be at least 8 characters",
                "password",
            ));
        }

        let password_hash = self.hasher.hash(password)?;
        let user = self
            .users
            .create_user(email, phone, &password_hash, UserRole::Student)
            .await?;

        if let Some(email) = &user.email {
            self.jobs.enqueue(Job::ProcessUserRegistration {
                user_id: user.id_str().to_string(),
                user_email: email.clone(),
            });
        }

        log::info!("✅ User registered successfully: {}", user.id_str());
        Ok(user)
    }

    /// Verifies credentials (email first, else phone) and issues a token pair.
    pub async fn login(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        password: &str,
    ) -> AppResult<(User, TokenPair)> {
        let found = match (email, phone) {
            (Some(email), _) => self.repository.get_by_email_with_password(email).await?,
            (None, Some(phone)) => self.repository.get_by_phone_with_password(phone).await?,
            (None, None) => {
                return Err(AppError::validation(
                    "Email or phone is required",
                    "credentials",
                ))
            }
        };

        let Some((user, password_hash)) = found else {
            log::warn!("⚠️  Login failed: unknown user");
            return Err(AppError::unauthorized("Invalid credentials"));
        };

        if !self.hasher.verify(password, &password_hash) {
            log::warn!("⚠️  Login failed: bad password for {}", user.id_str());
            return Err(AppError::unauthorized("Invalid credentials"));
        }

        if !user.is_active {
            return Err(AppError::unauthorized("Account is deactivated"));
        }

        if self.hasher.needs_rehash(&password_hash) {
            self.upgrade_hash(&user, password).await;
        }

        let tokens = self.jwt.create_token_pair(user.id_str(), user.role)?;
        log::info!("🔐 User logged in: {}", user.id_str());
        Ok((user, tokens))
    }

    /// Re-hashes with the configured cost. Failure only costs the upgrade.
    async fn upgrade_hash(&self, user: &User, password: &str) {
        let result = match self.hasher.hash(password) {
            Ok(hash) => self.repository.update_password(user.id_str(), &hash).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => log::info!("🔑 Password hash upgraded for {}", user.id_str()),
            Err(e) => log::warn!("⚠️  Could not upgrade password hash for {}: {}", user.id_str(), e),
        }
    }

    /// Exchanges a refresh token for a fresh pair carrying the user's current role.
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self
            .jwt
            .decode_token(refresh_token)
            .ok_or_else(|| AppError::unauthorized("Invalid or expired refresh token"))?;

        if claims.token_type != TokenType::Refresh {
            return Err(AppError::unauthorized("Invalid token type"));
        }

        if self.blacklist.is_revoked(&claims.jti).await {
            return Err(AppError::unauthorized("Token has been revoked"));
        }

        let user = self
            .repository
            .get_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(AppError::unauthorized("Account is deactivated"));
        }

        self.jwt.create_token_pair(user.id_str(), user.role)
    }

    /// Claims of a valid, unrevoked access token.
    pub async fn authenticate(&self, token: &str) -> AppResult<Claims> {
        let claims = self
            .jwt
            .decode_access_token(token)
            .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

        if self.blacklist.is_revoked(&claims.jti).await {
            return Err(AppError::unauthorized("Invalid or expired token"));
        }

        Ok(claims)
    }

    pub async fn get_current_user(&self, user_id: &str) -> AppResult<User> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| user_not_found(user_id))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        email: Option<String>,
        phone: Option<String>,
    ) -> AppResult<User> {
        let user = self.get_current_user(user_id).await?;
        self.users
            .update_user(
                user,
                UserChanges {
                    email,
                    phone,
                    role: None,
                },
            )
            .await
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                "New password must be at least 8 characters",
                "new_password",
            ));
        }

        let user = self.get_current_user(user_id).await?;

        let found = match (&user.email, &user.phone) {
            (Some(email), _) => self.repository.get_by_email_with_password(email).await?,
            (None, Some(phone)) => self.repository.get_by_phone_with_password(phone).await?,
            (None, None) => None,
        };
        let Some((_, current_hash)) = found else {
            return Err(AppError::not_found("User not found", "user"));
        };

        if !self.hasher.verify(current_password, &current_hash) {
            return Err(AppError::unauthorized("Current password is incorrect"));
        }

        let new_hash = self.hasher.hash(new_password)?;
        self.repository.update_password(user_id, &new_hash).await?;

        log::info!("🔑 Password changed for {}", user_id);
        Ok(())
    }

    pub async fn deactivate_account(&self, user_id: &str) -> AppResult<()> {
        let user = self.get_current_user(user_id).await?;
        self.users.deactivate_user(&user).await?;

        self.jobs.enqueue(Job::DeactivateUserData {
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    /// Revokes the token until it would have expired.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        let claims = self
            .jwt
            .decode_token(token)
            .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

        self.blacklist.revoke(&claims.jti, claims.exp).await;
        log::info!("👋 User logged out: {}", claims.sub);
        Ok(())
    }
}
