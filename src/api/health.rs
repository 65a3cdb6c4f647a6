use crate::api::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
    pub redis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_error: Option<String>,
}

fn connection_state(connected: bool) -> String {
    if connected { "connected" } else { "disconnected" }.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status. Always 200; check `status`.", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let debug = state.settings.debug;

    let database = state.repository.ping().await;
    if let Err(e) = &database {
        log::warn!("⚠️  Health check: database unreachable: {}", e);
    }

    // Cache outages do not degrade the service.
    let (redis_ok, redis_message) = state.redis.health_check().await;

    HttpResponse::Ok().json(HealthResponse {
        status: if database.is_ok() { "ok" } else { "degraded" }.to_string(),
        service: "api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: connection_state(database.is_ok()),
        database_error: database.err().filter(|_| debug).map(|e| e.to_string()),
        redis: connection_state(redis_ok),
        redis_error: Some(redis_message).filter(|_| debug && !redis_ok),
    })
}
