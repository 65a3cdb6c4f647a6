use crate::cache::{CacheService, RedisClient};
use crate::utils::AppError;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    Error, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const EXEMPT_PATHS: [&str; 1] = ["/health"];

/// `N` requests per window, parsed from strings like `1000/hour` or `5/minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u64,
    pub window_secs: u64,
}

impl FromStr for RateLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, unit) = s
            .split_once('/')
            .ok_or_else(|| format!("Invalid rate limit {:?}, expected N/unit", s))?;

        let max_requests = count
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("Invalid request count in rate limit {:?}", s))?;

        let unit = unit.trim().to_lowercase();
        let window_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3600,
            "day" => 86_400,
            _ => return Err(format!("Invalid time unit in rate limit {:?}", s)),
        };

        Ok(Self {
            max_requests,
            window_secs,
        })
    }
}

/// Per-client `(window_start, count)`. Entries from earlier windows are dropped
/// once per window.
#[derive(Default)]
struct MemoryCounters {
    counters: HashMap<String, (u64, u64)>,
    swept_window: u64,
}

impl MemoryCounters {
    fn count(&mut self, client: &str, window_start: u64) -> u64 {
        if self.swept_window != window_start {
            self.counters.retain(|_, (start, _)| *start == window_start);
            self.swept_window = window_start;
        }

        let entry = self.counters.entry(client.to_string()).or_insert((window_start, 0));
        if entry.0 != window_start {
            *entry = (window_start, 0);
        }
        entry.1 += 1;
        entry.1
    }
}

#[derive(Clone)]
enum CounterStore {
    Memory(Arc<Mutex<MemoryCounters>>),
    Redis(CacheService),
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Unix time the current window ends
    pub reset: u64,
    pub retry_after: u64,
}

/// Fixed-window request counter keyed by client.
#[derive(Clone)]
pub struct RateLimiter {
    limit: Option<RateLimit>,
    store: CounterStore,
}

impl RateLimiter {
    pub fn memory(limit: RateLimit) -> Self {
        Self {
            limit: Some(limit),
            store: CounterStore::Memory(Arc::default()),
        }
    }

    /// Counts in Redis. Storage errors let the request through.
    pub fn redis(limit: RateLimit, redis: RedisClient) -> Self {
        Self {
            limit: Some(limit),
            store: CounterStore::Redis(CacheService::with_prefix(redis, "ratelimit")),
        }
    }

    pub fn disabled() -> Self {
        Self {
            limit: None,
            store: CounterStore::Memory(Arc::default()),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.limit.is_some() && !EXEMPT_PATHS.contains(&path)
    }

    pub async fn check(&self, client: &str) -> Option<Decision> {
        let limit = self.limit?;
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let window_start = now - now % limit.window_secs;
        let reset = window_start + limit.window_secs;

        let count = match &self.store {
            CounterStore::Memory(counters) => counters.lock().ok()?.count(client, window_start),
            CounterStore::Redis(cache) => {
                let key = format!("{}:{}", client, window_start);
                match cache.increment(&key, 1).await {
                    Some(count) => {
                        if count == 1 {
                            cache.expire(&key, limit.window_secs).await;
                        }
                        count.max(0) as u64
                    }
                    None => {
                        log::debug!("Rate limit storage unavailable, allowing request");
                        return None;
                    }
                }
            }
        };

        Some(Decision {
            allowed: count <= limit.max_requests,
            limit: limit.max_requests,
            remaining: limit.max_requests.saturating_sub(count),
            reset,
            retry_after: reset.saturating_sub(now).max(1),
        })
    }
}

fn set_headers(headers: &mut HeaderMap, decision: &Decision) {
    for (name, value) in [
        ("x-ratelimit-limit", decision.limit),
        ("x-ratelimit-remaining", decision.remaining),
        ("x-ratelimit-reset", decision.reset),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
}

fn client_key(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Global per-client rate limit. `/health` is never limited.
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
}

impl RateLimitMiddleware {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            if !limiter.applies_to(req.path()) {
                return Ok(service.call(req).await?.map_into_left_body());
            }

            let Some(decision) = limiter.check(&client_key(&req)).await else {
                return Ok(service.call(req).await?.map_into_left_body());
            };

            if !decision.allowed {
                let (http_req, _) = req.into_parts();
                let mut res = HttpResponse::from_error(AppError::RateLimited {
                    retry_after: decision.retry_after,
                });
                set_headers(res.headers_mut(), &decision);
                return Ok(ServiceResponse::new(http_req, res).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            set_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}
