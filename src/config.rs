use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;

const ACCESS_TOKEN_MINUTES_RANGE: RangeInclusive<i64> = 1..=525_600;
const REFRESH_TOKEN_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;
const BCRYPT_COST_RANGE: RangeInclusive<u32> = 4..=31;

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

/// Application settings loaded from the environment (and `.env` via dotenv).
///
/// Variable names are the upper-cased field names, e.g. `MONGODB_URL`.
#[derive(Debug, Clone)]
pub struct Settings {
    // App
    pub environment: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,

    // MongoDB
    pub mongodb_url: String,
    pub mongodb_database_name: String,
    pub mongodb_pool_size: u32,

    // Security
    pub secret_key: String,
    pub jwt_algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub bcrypt_cost: u32,

    // CORS
    pub cors_origins: CorsOrigins,

    // Redis
    pub redis_url: String,
    pub user_cache_ttl_seconds: u64,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_default: String,
    pub rate_limit_storage: String,

    // Background jobs
    pub job_workers: usize,

    // Logging
    pub log_level: String,
    pub log_json_format: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            debug: true,
            host: "0.0.0.0".to_string(),
            port: 8000,
            mongodb_url: "mongodb://localhost:27017".to_string(),
            mongodb_database_name: "app_db".to_string(),
            mongodb_pool_size: 10,
            secret_key: "dev-secret-key-change-in-production-min-32-characters-long".to_string(),
            jwt_algorithm: "HS256".to_string(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_origins: CorsOrigins::Any,
            redis_url: "redis://localhost:6379/0".to_string(),
            user_cache_ttl_seconds: 60,
            rate_limit_enabled: true,
            rate_limit_default: "1000/hour".to_string(),
            rate_limit_storage: "memory://".to_string(),
            job_workers: 2,
            log_level: "INFO".to_string(),
            log_json_format: false,
        }
    }
}

impl Settings {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| {
            env::var(key)
                .or_else(|_| env::var(key.to_lowercase()))
                .ok()
        })
    }

    /// Builds settings from an arbitrary key lookup. Missing or invalid values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        Self {
            environment: string("ENVIRONMENT", defaults.environment),
            debug: lookup("DEBUG").map(|v| parse_bool(&v)).unwrap_or(defaults.debug),
            host: string("HOST", defaults.host),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            mongodb_url: string("MONGODB_URL", defaults.mongodb_url),
            mongodb_database_name: string("MONGODB_DATABASE_NAME", defaults.mongodb_database_name),
            mongodb_pool_size: parse_or(
                "MONGODB_POOL_SIZE",
                lookup("MONGODB_POOL_SIZE"),
                defaults.mongodb_pool_size,
            ),
            secret_key: string("SECRET_KEY", defaults.secret_key),
            jwt_algorithm: string("JWT_ALGORITHM", defaults.jwt_algorithm),
            access_token_expire_minutes: parse_in_range(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                lookup("ACCESS_TOKEN_EXPIRE_MINUTES"),
                defaults.access_token_expire_minutes,
                ACCESS_TOKEN_MINUTES_RANGE,
            ),
            refresh_token_expire_days: parse_in_range(
                "REFRESH_TOKEN_EXPIRE_DAYS",
                lookup("REFRESH_TOKEN_EXPIRE_DAYS"),
                defaults.refresh_token_expire_days,
                REFRESH_TOKEN_DAYS_RANGE,
            ),
            bcrypt_cost: parse_in_range(
                "BCRYPT_COST",
                lookup("BCRYPT_COST"),
                defaults.bcrypt_cost,
                BCRYPT_COST_RANGE,
            ),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|v| parse_cors_origins(&v))
                .unwrap_or(defaults.cors_origins),
            redis_url: string("REDIS_URL", defaults.redis_url),
            user_cache_ttl_seconds: parse_or(
                "USER_CACHE_TTL_SECONDS",
                lookup("USER_CACHE_TTL_SECONDS"),
                defaults.user_cache_ttl_seconds,
            ),
            rate_limit_enabled: lookup("RATE_LIMIT_ENABLED")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.rate_limit_enabled),
            rate_limit_default: string("RATE_LIMIT_DEFAULT", defaults.rate_limit_default),
            rate_limit_storage: string("RATE_LIMIT_STORAGE", defaults.rate_limit_storage),
            job_workers: parse_or("JOB_WORKERS", lookup("JOB_WORKERS"), defaults.job_workers),
            log_level: string("LOG_LEVEL", defaults.log_level),
            log_json_format: lookup("LOG_JSON_FORMAT")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.log_json_format),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `true`, `1`, `yes` and `on` (any case) are true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Accepts a JSON array, `*`, an empty string, or a comma-separated list.
pub fn parse_cors_origins(value: &str) -> CorsOrigins {
    let trimmed = value.trim();

    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return CorsOrigins::List(list);
        }
    }

    if trimmed.is_empty() || trimmed == "*" {
        return CorsOrigins::Any;
    }

    let origins: Vec<String> = trimmed
        .split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

    if origins.is_empty() {
        CorsOrigins::Any
    } else {
        CorsOrigins::List(origins)
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                log::warn!("⚠️  Invalid value for {}: {:?}, using default", key, value);
                default
            }
        },
        None => default,
    }
}

/// Like `parse_or`, but values outside `range` also fall back to the default.
fn parse_in_range<T>(key: &str, raw: Option<String>, default: T, range: RangeInclusive<T>) -> T
where
    T: FromStr + PartialOrd + Copy + std::fmt::Debug,
{
    let value = parse_or(key, raw, default);
    if range.contains(&value) {
        value
    } else {
        log::warn!(
            "⚠️  {} = {:?} is outside {:?}..={:?}, using default",
            key,
            value,
            range.start(),
            range.end()
        );
        default
    }
}
