use axum::{extract::FromRequestParts, http::header};
use uuid::Uuid;

use crate::{
    error::AppError,
    session::{AccountKind, SESSION_COOKIE},
    state::AppState,
};

/// Authenticated caller, decoded from the session cookie or a Bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account_id: String,
    pub email: String,
    pub role: String,
    pub kind: AccountKind,
}

impl AuthSession {
    pub fn is_admin(&self) -> bool {
        self.kind == AccountKind::Admin || self.role == "admin"
    }

    /// Relational account ids are UUIDs; admin accounts live in the document
    /// store and never reach the surfaces that call this.
    pub fn user_uuid(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.account_id)
            .map_err(|_| AppError::Forbidden("Customer account required".to_string()))
    }
}

pub fn ensure_admin(session: &AuthSession) -> Result<(), AppError> {
    if !session.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

/// Passes for admins and for callers acting on their own account.
pub fn ensure_admin_or_self(session: &AuthSession, target_id: &str) -> Result<(), AppError> {
    if !session.is_admin() && session.account_id != target_id {
        return Err(AppError::Forbidden("Unauthorized".to_string()));
    }
    Ok(())
}

fn cookie_token(parts: &axum::http::request::Parts) -> Option<String> {
    let raw = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

fn bearer_token(parts: &axum::http::request::Parts) -> Option<String> {
    let raw = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    raw.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Cookie wins over the Authorization header so browser sessions are
        // not overridden by a stale Bearer token.
        let token = cookie_token(parts)
            .or_else(|| bearer_token(parts))
            .ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))?;

        let claims = state.sessions.verify(&token)?;

        Ok(AuthSession {
            account_id: claims.id,
            email: claims.email,
            role: claims.role,
            kind: claims.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(account_id: &str, role: &str, kind: AccountKind) -> AuthSession {
        AuthSession {
            account_id: account_id.to_string(),
            email: "guard@example.com".to_string(),
            role: role.to_string(),
            kind,
        }
    }

    #[test]
    fn admin_sessions_pass_every_guard() {
        let admin = session("admin:root", "admin", AccountKind::Admin);
        assert!(admin.is_admin());
        assert!(ensure_admin(&admin).is_ok());
        assert!(ensure_admin_or_self(&admin, "someone-else").is_ok());
    }

    #[test]
    fn customers_only_pass_the_self_guard_for_their_own_id() {
        let id = "0c0f7a4e-9d0a-4a52-a0a2-2a4f0a6a9e01";
        let customer = session(id, "customer", AccountKind::User);
        assert!(!customer.is_admin());
        assert!(ensure_admin(&customer).is_err());
        assert!(ensure_admin_or_self(&customer, id).is_ok());

        let denied = ensure_admin_or_self(&customer, "another-id");
        assert!(matches!(denied, Err(AppError::Forbidden(m)) if m == "Unauthorized"));
    }

    #[test]
    fn only_relational_ids_parse_as_user_uuids() {
        let admin = session("admin:root", "admin", AccountKind::Admin);
        assert!(admin.user_uuid().is_err());

        let customer = session(
            "0c0f7a4e-9d0a-4a52-a0a2-2a4f0a6a9e01",
            "customer",
            AccountKind::User,
        );
        assert!(customer.user_uuid().is_ok());
    }
}
