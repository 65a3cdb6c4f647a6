use crate::api::AppState;
use crate::utils::AppError;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

fn not_authenticated() -> AppError {
    AppError::forbidden("Not authenticated")
}

/// The raw bearer token, unverified. Missing or malformed header → 403.
pub struct BearerToken(pub String);

impl FromRequest for BearerToken {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(bearer_token(req).map(BearerToken).ok_or_else(not_authenticated))
    }
}

/// Caller identified by a valid, unrevoked access token.
///
/// Missing credentials → 403 "Not authenticated"; a bad token → 401 "Invalid or expired token".
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let token = token.ok_or_else(not_authenticated)?;
            let state = state.ok_or_else(|| AppError::internal("Application state not configured"))?;

            let claims = state.auth.authenticate(&token).await?;
            Ok(AuthenticatedUser {
                user_id: claims.sub,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let lower = TestRequest::default()
            .insert_header(("Authorization", "bearer xyz"))
            .to_http_request();
        assert_eq!(bearer_token(&lower).as_deref(), Some("xyz"));

        for bad in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   ", "token"] {
            let req = TestRequest::default()
                .insert_header(("Authorization", bad))
                .to_http_request();
            assert!(bearer_token(&req).is_none(), "{:?} should be rejected", bad);
        }

        assert!(bearer_token(&TestRequest::default().to_http_request()).is_none());
    }
}
