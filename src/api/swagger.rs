use actix_web::{web, HttpResponse};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub const OPENAPI_URL: &str = "/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Auth API Service",
        version = "1.0.0",
        description = "User registration and authentication API.\n\n**Authentication:** protected endpoints take a JWT access token as `Authorization: Bearer <token>`.\n\n**Features:**\n- Email or phone registration and login\n- Access/refresh token pairs with logout revocation\n- Profile management and account deactivation\n- Admin user listing and background job control\n- Health monitoring",
        contact(
            name = "Auth API Team",
            email = "support@example.com"
        )
    ),
    paths(
        // Auth
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::refresh_token,
        crate::api::auth::get_me,
        crate::api::auth::update_me,
        crate::api::auth::change_password,
        crate::api::auth::delete_me,
        crate::api::auth::logout,

        // Admin
        crate::api::users::list_users,
        crate::api::jobs::enqueue_job,
        crate::api::jobs::get_job,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::api::schemas::RegisterRequest,
            crate::api::schemas::LoginRequest,
            crate::api::schemas::RefreshTokenRequest,
            crate::api::schemas::ChangePasswordRequest,
            crate::api::schemas::UpdateProfileRequest,
            crate::api::schemas::EnqueueJobRequest,
            crate::api::schemas::UserResponse,
            crate::api::schemas::AuthResponse,
            crate::api::schemas::TokenResponse,
            crate::api::schemas::UserListResponse,
            crate::api::schemas::JobAcceptedResponse,
            crate::domain::UserRole,
            crate::jobs::JobRecord,
            crate::jobs::JobStatus,
            crate::utils::ErrorResponse,
            crate::utils::ErrorDetail,
            crate::utils::PaginationMeta,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login, token refresh, profile and logout."),
        (name = "Users", description = "User administration. Admin role required."),
        (name = "Jobs", description = "Background job submission and status. Admin role required."),
        (name = "Health", description = "Service and dependency status."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /api/v1/auth/login"))
                        .build(),
                ),
            );
        }
    }
}

const REDOC_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Auth API Service - ReDoc</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1">
  </head>
  <body>
    <redoc spec-url="/openapi.json"></redoc>
    <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"></script>
  </body>
</html>"#;

async fn redoc() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(REDOC_PAGE)
}

/// Swagger UI at `/docs/`, ReDoc at `/redoc`, raw document at `/openapi.json`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(SwaggerUi::new("/docs/{_:.*}").url(OPENAPI_URL, ApiDoc::openapi()))
        .route("/redoc", web::get().to(redoc));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{self, test_app};
    use actix_web::http::StatusCode;
    use actix_web::test::{call_service, read_body_json, TestRequest};
    use serde_json::Value;

    #[test]
    fn test_document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in ["/api/v1/auth/login", "/api/v1/auth/me", "/api/v1/users", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[actix_rt::test]
    async fn test_docs_are_served() {
        let app = test_app!(testing::state());

        let res = call_service(&app, TestRequest::get().uri(OPENAPI_URL).to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = read_body_json(res).await;
        assert_eq!(body["info"]["title"], "Auth API Service");

        let res = call_service(&app, TestRequest::get().uri("/redoc").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
