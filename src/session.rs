use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "token";
const SESSION_TTL_DAYS: i64 = 7;

/// Which account space a session belongs to: relational users or
/// document-store admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys, precomputed once at startup and carried in
/// the application state instead of being read from the environment per
/// request.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    cookie_secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &str, cookie_secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            cookie_secure,
        }
    }

    pub fn issue(
        &self,
        id: String,
        email: String,
        role: String,
        kind: AccountKind,
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            id,
            email,
            role,
            kind,
            iat: now.timestamp(),
            exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        if data.claims.id.is_empty() {
            return Err(AppError::Unauthorized("Invalid token structure".to_string()));
        }
        Ok(data.claims)
    }

    /// Build the http-only session cookie carrying `token`.
    pub fn session_cookie(&self, token: &str) -> String {
        let max_age = Duration::days(SESSION_TTL_DAYS).num_seconds();
        let mut cookie =
            format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(&self) -> String {
        let mut cookie =
            format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
