pub mod cache_service;
pub mod cached_user_repository;
pub mod redis_client;
pub mod token_blacklist;

pub use cache_service::CacheService;
pub use cached_user_repository::CachedUserRepository;
pub use redis_client::RedisClient;
pub use token_blacklist::TokenBlacklist;
