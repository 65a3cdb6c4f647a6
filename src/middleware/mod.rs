pub mod auth;
pub mod rate_limit;
pub mod trace_id;

pub use auth::{AuthenticatedUser, BearerToken};
pub use rate_limit::{RateLimit, RateLimitMiddleware, RateLimiter};
pub use trace_id::TraceIdMiddleware;
