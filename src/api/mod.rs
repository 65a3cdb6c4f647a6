pub mod auth;
pub mod health;
pub mod jobs;
pub mod schemas;
pub mod swagger;
pub mod users;

use crate::cache::{RedisClient, TokenBlacklist};
use crate::config::Settings;
use crate::domain::{User, UserRepository};
use crate::jobs::JobQueue;
use crate::middleware::AuthenticatedUser;
use crate::security::{JwtService, PasswordHasher};
use crate::services::{AuthService, UserService};
use crate::utils::{error::json_error_handler, AppError, AppResult, ErrorDetail};
use actix_web::web;
use std::sync::Arc;

/// Shared application state, registered once as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub auth: AuthService,
    pub users: UserService,
    pub repository: Arc<dyn UserRepository>,
    pub redis: RedisClient,
    pub jobs: JobQueue,
}

impl AppState {
    pub fn new(
        settings: Settings,
        repository: Arc<dyn UserRepository>,
        redis: RedisClient,
        blacklist: TokenBlacklist,
        jobs: JobQueue,
    ) -> Self {
        let auth = AuthService::new(
            repository.clone(),
            PasswordHasher::new(settings.bcrypt_cost),
            JwtService::from_settings(&settings),
            blacklist,
            jobs.clone(),
        );

        Self {
            users: UserService::new(repository.clone()),
            auth,
            settings,
            repository,
            redis,
            jobs,
        }
    }

    /// The caller's user record, if it is an active admin.
    pub async fn require_admin(&self, caller: &AuthenticatedUser) -> AppResult<User> {
        let user = self.auth.get_current_user(&caller.user_id).await?;
        if !user.is_active || !user.is_admin() {
            log::warn!("⛔ Admin route refused for {}", caller.user_id);
            return Err(AppError::forbidden("Admin privileges required"));
        }
        Ok(user)
    }
}

/// JSON body limits and 422 mapping for malformed bodies.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(json_error_handler)
}

/// Malformed query strings are 422s like malformed bodies.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::RequestValidation(vec![ErrorDetail::field("query", err.to_string(), "query_invalid")])
            .into()
    })
}

/// Registers every route. Shared by `main` and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/v1/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/refresh", web::post().to(auth::refresh_token))
                .route("/me", web::get().to(auth::get_me))
                .route("/me", web::patch().to(auth::update_me))
                .route("/me", web::delete().to(auth::delete_me))
                .route("/change-password", web::post().to(auth::change_password))
                .route("/logout", web::post().to(auth::logout)),
        )
        .service(web::scope("/api/v1/users").route("", web::get().to(users::list_users)))
        .service(
            web::scope("/api/v1/jobs")
                .route("", web::post().to(jobs::enqueue_job))
                .route("/{job_id}", web::get().to(jobs::get_job)),
        );

    swagger::configure(cfg);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::database::memory::InMemoryUserRepository;
    use crate::domain::UserRole;

    pub fn state() -> AppState {
        let settings = Settings {
            bcrypt_cost: 4,
            debug: false,
            ..Settings::default()
        };
        let redis = RedisClient::disconnected();
        AppState::new(
            settings,
            Arc::new(InMemoryUserRepository::default()),
            redis.clone(),
            TokenBlacklist::new(redis),
            JobQueue::new(),
        )
    }

    /// Service with every route and the given state.
    macro_rules! test_app {
        ($state:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data(actix_web::web::Data::new($state))
                    .configure(crate::api::configure),
            )
            .await
        };
    }
    pub(crate) use test_app;

    /// Registers a user directly and returns an access token for it.
    pub async fn user_with_token(state: &AppState, email: &str, role: UserRole) -> (User, String) {
        let hash = PasswordHasher::new(4).hash("securepassword123").unwrap();
        let user = state
            .users
            .create_user(Some(email.to_string()), None, &hash, role)
            .await
            .unwrap();
        let (_, tokens) = state
            .auth
            .login(Some(email), None, "securepassword123")
            .await
            .unwrap();
        (user, tokens.access_token)
    }
}
