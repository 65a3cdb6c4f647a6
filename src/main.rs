mod api;
mod cache;
mod config;
mod database;
mod domain;
mod jobs;
mod middleware;
mod security;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use cache::{CacheService, CachedUserRepository, RedisClient, TokenBlacklist};
use config::{CorsOrigins, Settings};
use dotenv::dotenv;
use domain::UserRepository;
use jobs::{JobContext, JobQueue};
use middleware::{RateLimit, RateLimitMiddleware, RateLimiter, TraceIdMiddleware};
use std::sync::Arc;

fn build_cors(settings: &Settings) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    if settings.debug {
        return cors.allow_any_origin();
    }

    match &settings.cors_origins {
        CorsOrigins::Any => cors.allow_any_origin(),
        CorsOrigins::List(origins) => origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin)),
    }
}

/// Picks the counter store from `RATE_LIMIT_STORAGE`. The main Redis connection is
/// reused when both point at the same server.
async fn build_rate_limiter(settings: &Settings, redis: &RedisClient) -> RateLimiter {
    if !settings.rate_limit_enabled {
        log::info!("🚦 Rate limiting disabled");
        return RateLimiter::disabled();
    }

    let limit = match settings.rate_limit_default.parse::<RateLimit>() {
        Ok(limit) => limit,
        Err(e) => {
            log::warn!("⚠️  {}; rate limiting disabled", e);
            return RateLimiter::disabled();
        }
    };

    let storage = settings.rate_limit_storage.trim();
    if storage.starts_with("redis://") || storage.starts_with("rediss://") {
        let client = if storage == settings.redis_url {
            redis.clone()
        } else {
            RedisClient::connect(storage).await
        };
        log::info!("🚦 Rate limit: {} (redis)", settings.rate_limit_default);
        RateLimiter::redis(limit, client)
    } else {
        log::info!("🚦 Rate limit: {} (memory)", settings.rate_limit_default);
        RateLimiter::memory(limit)
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    let settings = Settings::from_env();
    utils::logging::init(&settings.log_level, settings.log_json_format);

    log::info!("🚀 Starting Auth API Service v{}", env!("CARGO_PKG_VERSION"));
    log::info!("🌍 Environment: {}", settings.environment);
    if settings.debug {
        log::warn!("🐞 Debug mode: error details are exposed to clients");
    }
    if !settings.debug && matches!(settings.cors_origins, CorsOrigins::Any) {
        log::warn!("⚠️  CORS allows any origin outside debug mode");
    }

    // Initialize MongoDB connection
    let db = match database::MongoDB::connect(&settings).await {
        Ok(db) => db,
        Err(e) => {
            log::error!("❌ Invalid MongoDB configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    let redis = RedisClient::connect(&settings.redis_url).await;

    let mongo_repository: Arc<dyn UserRepository> = Arc::new(database::MongoUserRepository::new(db.clone()));
    let repository: Arc<dyn UserRepository> = Arc::new(CachedUserRepository::new(
        mongo_repository,
        CacheService::new(redis.clone()),
        settings.user_cache_ttl_seconds,
    ));

    let blacklist = TokenBlacklist::new(redis.clone());
    let job_queue = JobQueue::new();

    // 📅 Background jobs
    log::info!("📅 Starting background jobs...");
    job_queue.start_workers(
        settings.job_workers,
        JobContext {
            queue: job_queue.clone(),
            blacklist: blacklist.clone(),
        },
    );
    jobs::scheduler::start_scheduler(job_queue.clone());
    log::info!("✅ Background jobs started");

    let rate_limiter = build_rate_limiter(&settings, &redis).await;

    let state = web::Data::new(api::AppState::new(
        settings.clone(),
        repository,
        redis.clone(),
        blacklist,
        job_queue,
    ));

    let bind_address = settings.bind_address();
    log::info!("🌐 Server starting on {}", bind_address);
    log::info!("📚 Swagger UI available at: http://{}/docs/", bind_address);
    log::info!("📖 ReDoc available at: http://{}/redoc", bind_address);
    log::info!("📄 OpenAPI spec at: http://{}{}", bind_address, api::swagger::OPENAPI_URL);

    let server_settings = settings.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Compress::default())
            .wrap(RateLimitMiddleware::new(rate_limiter.clone()))
            .wrap(TraceIdMiddleware::new(server_settings.debug))
            .wrap(build_cors(&server_settings))
            .wrap(Logger::new("%a \"%r\" %s %b %Dms trace=%{x-trace-id}o"))
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    log::info!("🛑 Shutting down...");
    redis.disconnect().await;
    db.shutdown().await;
    log::info!("👋 Shutdown complete");
    Ok(())
}
