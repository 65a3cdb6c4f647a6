use crate::domain::{User, UserRole};
use crate::security::TokenPair;
use crate::utils::{AppError, AppResult, ErrorDetail, PaginatedResponse, PaginationMeta, PaginationParams};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
            .expect("email pattern compiles");
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[1-9]\d{1,14}$").expect("phone pattern compiles");
}

pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Collects field violations for a 422 response.
#[derive(Default)]
struct Violations(Vec<ErrorDetail>);

impl Violations {
    fn add(&mut self, field: &str, message: impl Into<String>, code: &str) {
        self.0.push(ErrorDetail::field(field, message, code));
    }

    fn email(&mut self, email: &Option<String>) {
        if let Some(email) = email {
            if !EMAIL_RE.is_match(email) {
                self.add("email", "value is not a valid email address", "value_error");
            }
        }
    }

    fn phone(&mut self, phone: &Option<String>) {
        if let Some(phone) = phone {
            if !PHONE_RE.is_match(phone) {
                self.add(
                    "phone",
                    "String should match pattern '^\\+?[1-9]\\d{1,14}$'",
                    "string_pattern_mismatch",
                );
            }
        }
    }

    fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.add(
                field,
                format!("String should have at least {} characters", min),
                "string_too_short",
            );
        } else if len > max {
            self.add(
                field,
                format!("String should have at most {} characters", max),
                "string_too_long",
            );
        }
    }

    fn require_contact(&mut self, email: &Option<String>, phone: &Option<String>, message: &str) {
        if email.is_none() && phone.is_none() {
            self.add("body", message, "value_error");
        }
    }

    fn finish(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::RequestValidation(self.0))
        }
    }
}

/// Lower-cases the domain part, which is case-insensitive.
fn normalize_email(email: Option<String>) -> Option<String> {
    email.map(|e| match e.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => e,
    })
}

// ==================== REQUESTS ====================

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"email": "user@example.com", "phone": "+1234567890", "password": "securepassword123"}))]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    /// 8-128 characters
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(mut self) -> AppResult<Self> {
        let mut v = Violations::default();
        v.email(&self.email);
        v.phone(&self.phone);
        v.length("password", &self.password, 8, MAX_PASSWORD_LEN);
        v.require_contact(&self.email, &self.phone, "Either email or phone must be provided");
        v.finish()?;

        self.email = normalize_email(self.email);
        Ok(self)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"email": "user@example.com", "password": "securepassword123"}))]
pub struct LoginRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(mut self) -> AppResult<Self> {
        let mut v = Violations::default();
        v.email(&self.email);
        v.phone(&self.phone);
        v.length("password", &self.password, 1, usize::MAX);
        v.require_contact(&self.email, &self.phone, "Either email or phone must be provided");
        v.finish()?;

        self.email = normalize_email(self.email);
        Ok(self)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"refresh_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9..."}))]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    pub fn validate(self) -> AppResult<Self> {
        let mut v = Violations::default();
        v.length("refresh_token", &self.refresh_token, 1, usize::MAX);
        v.finish()?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"current_password": "oldpassword123", "new_password": "newsecurepassword123"}))]
pub struct ChangePasswordRequest {
    pub current_password: String,
    /// 8-128 characters
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(self) -> AppResult<Self> {
        let mut v = Violations::default();
        v.length("current_password", &self.current_password, 1, usize::MAX);
        v.length("new_password", &self.new_password, 8, MAX_PASSWORD_LEN);
        v.finish()?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"email": "newemail@example.com", "phone": "+1234567890"}))]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(mut self) -> AppResult<Self> {
        let mut v = Violations::default();
        v.email(&self.email);
        v.phone(&self.phone);
        v.require_contact(&self.email, &self.phone, "At least email or phone must be provided");
        v.finish()?;

        self.email = normalize_email(self.email);
        Ok(self)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Page number, from 1
    pub page: Option<u64>,
    /// Items per page (1-100)
    pub page_size: Option<u64>,
    /// Only users with this role
    pub role: Option<UserRole>,
}

impl ListUsersQuery {
    pub fn validate(self) -> AppResult<(PaginationParams, Option<UserRole>)> {
        let defaults = PaginationParams::default();
        let page = self.page.unwrap_or(defaults.page);
        let page_size = self.page_size.unwrap_or(defaults.page_size);

        let mut v = Violations::default();
        if page < 1 {
            v.add("page", "Input should be greater than or equal to 1", "greater_than_equal");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            v.add(
                "page_size",
                format!("Input should be between 1 and {}", MAX_PAGE_SIZE),
                "range_error",
            );
        } else if page
            .saturating_sub(1)
            .checked_mul(page_size)
            .map_or(true, |skip| skip > i64::MAX as u64)
        {
            v.add("page", "Page is out of range", "out_of_range");
        }
        v.finish()?;

        Ok((PaginationParams::new(page, page_size), self.role))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"name": "export_user_data", "args": {"user_id": "65f1c0ffee0000000000beef", "export_format": "csv"}}))]
pub struct EnqueueJobRequest {
    /// Job name, e.g. `send_email`
    pub name: String,
    /// Job arguments
    #[serde(default)]
    #[schema(value_type = Object)]
    pub args: serde_json::Value,
}

// ==================== RESPONSES ====================

/// User response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            email: user.email,
            phone: user.phone,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Token pair
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type.to_string(),
        }
    }
}

/// Tokens plus the authenticated user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

impl AuthResponse {
    pub fn new(user: User, tokens: TokenPair) -> Self {
        let tokens = TokenResponse::from(tokens);
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            user: user.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub meta: PaginationMeta,
}

impl From<PaginatedResponse<User>> for UserListResponse {
    fn from(page: PaginatedResponse<User>) -> Self {
        Self {
            items: page.items.into_iter().map(UserResponse::from).collect(),
            meta: page.meta,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobAcceptedResponse {
    pub job_id: String,
    pub name: String,
    pub queue: String,
}
