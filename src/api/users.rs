use crate::api::schemas::{ListUsersQuery, UserListResponse};
use crate::api::AppState;
use crate::middleware::AuthenticatedUser;
use crate::utils::{AppResult, ErrorResponse};
use actix_web::{web, HttpResponse};

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Active users, newest first", body = UserListResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 422, description = "Invalid pagination", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    query: web::Query<ListUsersQuery>,
) -> AppResult<HttpResponse> {
    state.require_admin(&caller).await?;
    let (pagination, role) = query.into_inner().validate()?;

    log::info!(
        "👥 GET /users - page: {}, page_size: {}, role: {}",
        pagination.page,
        pagination.page_size,
        role.map(|r| r.as_str()).unwrap_or("any")
    );

    let page = state.users.list_users(role, pagination).await?;
    Ok(HttpResponse::Ok().json(UserListResponse::from(page)))
}
