use crate::config::Settings;
use crate::domain::UserRole;
use crate::utils::AppResult;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: usize,
    pub exp: usize,
    pub jti: String, // token id, used for revocation
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// Issues and verifies access/refresh tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn from_settings(settings: &Settings) -> Self {
        let algorithm = match Algorithm::from_str(&settings.jwt_algorithm) {
            Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => alg,
            _ => {
                log::warn!(
                    "⚠️  Unsupported JWT algorithm {:?}, falling back to HS256",
                    settings.jwt_algorithm
                );
                Algorithm::HS256
            }
        };

        Self {
            encoding: EncodingKey::from_secret(settings.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret_key.as_bytes()),
            algorithm,
            access_ttl: Duration::minutes(settings.access_token_expire_minutes),
            refresh_ttl: Duration::days(settings.refresh_token_expire_days),
        }
    }

    fn issue(&self, user_id: &str, role: Option<UserRole>, token_type: TokenType, ttl: Duration) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.map(|r| r.to_string()),
            token_type,
            iat: now.timestamp().max(0) as usize,
            exp: (now + ttl).timestamp().max(0) as usize,
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    pub fn create_access_token(&self, user_id: &str, role: UserRole) -> AppResult<String> {
        self.issue(user_id, Some(role), TokenType::Access, self.access_ttl)
    }

    pub fn create_refresh_token(&self, user_id: &str) -> AppResult<String> {
        self.issue(user_id, None, TokenType::Refresh, self.refresh_ttl)
    }

    pub fn create_token_pair(&self, user_id: &str, role: UserRole) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.create_access_token(user_id, role)?,
            refresh_token: self.create_refresh_token(user_id)?,
            token_type: "bearer",
        })
    }

    /// Verifies signature and expiry. Any failure yields `None`.
    pub fn decode_token(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                log::debug!("Token rejected: {}", e);
                None
            }
        }
    }

    /// Claims of a valid *access* token.
    pub fn decode_access_token(&self, token: &str) -> Option<Claims> {
        self.decode_token(token)
            .filter(|claims| claims.token_type == TokenType::Access)
    }
}
