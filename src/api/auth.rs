use crate::api::schemas::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    TokenResponse, UpdateProfileRequest, UserResponse,
};
use crate::api::AppState;
use crate::middleware::{AuthenticatedUser, BearerToken};
use crate::utils::{AppResult, ErrorResponse};
use actix_web::{web, HttpResponse};

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 409, description = "Email or phone already registered", body = ErrorResponse),
        (status = 422, description = "Invalid request body", body = ErrorResponse)
    )
)]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner().validate()?;
    log::info!("📝 POST /auth/register");

    let user = state
        .auth
        .register(request.email, request.phone, &request.password)
        .await?;

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or deactivated account", body = ErrorResponse),
        (status = 422, description = "Invalid request body", body = ErrorResponse)
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner().validate()?;
    log::info!("🔐 POST /auth/login");

    let (user, tokens) = state
        .auth
        .login(
            request.email.as_deref(),
            request.phone.as_deref(),
            &request.password,
        )
        .await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(user, tokens)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid, expired or revoked refresh token", body = ErrorResponse)
    )
)]
pub async fn refresh_token(
    state: web::Data<AppState>,
    request: web::Json<RefreshTokenRequest>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner().validate()?;
    log::info!("🔄 POST /auth/refresh");

    let tokens = state.auth.refresh_token(&request.refresh_token).await?;
    Ok(HttpResponse::Ok().json(TokenResponse::from(tokens)))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Not authenticated", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(state: web::Data<AppState>, caller: AuthenticatedUser) -> AppResult<HttpResponse> {
    let user = state.auth.get_current_user(&caller.user_id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/auth/me",
    tag = "Auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 409, description = "Email or phone taken by another user", body = ErrorResponse),
        (status = 422, description = "Invalid request body", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_me(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    request: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner().validate()?;
    log::info!("✏️  PATCH /auth/me - user: {}", caller.user_id);

    let user = state
        .auth
        .update_profile(&caller.user_id, request.email, request.phone)
        .await?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "Auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password is incorrect", body = ErrorResponse),
        (status = 422, description = "Invalid request body", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    request: web::Json<ChangePasswordRequest>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner().validate()?;

    state
        .auth
        .change_password(&caller.user_id, &request.current_password, &request.new_password)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    delete,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 204, description = "Account deactivated"),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_me(state: web::Data<AppState>, caller: AuthenticatedUser) -> AppResult<HttpResponse> {
    log::info!("🗑️  DELETE /auth/me - user: {}", caller.user_id);
    state.auth.deactivate_account(&caller.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Not authenticated", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(state: web::Data<AppState>, token: BearerToken) -> AppResult<HttpResponse> {
    state.auth.logout(&token.0).await?;
    Ok(HttpResponse::NoContent().finish())
}
