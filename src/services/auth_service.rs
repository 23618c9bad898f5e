use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, Set, SqlErr};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::OrmConn,
    docstore::DocStore,
    dto::auth::{AuthResponse, LoginRequest, Profile, RegisterRequest, SessionUser},
    entity,
    error::{AppError, AppResult},
    middleware::auth::AuthSession,
    response::{ApiResponse, Meta},
    session::{AccountKind, SessionKeys},
};

/// A credential record from either account space, flattened for login.
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub kind: AccountKind,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AccountProvider: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>>;
}

struct RelationalUsers {
    orm: OrmConn,
}

#[async_trait]
impl AccountProvider for RelationalUsers {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>> {
        let found = entity::users::Entity::find()
            .filter(entity::users::Column::Email.eq(email))
            .one(&self.orm)
            .await?;
        Ok(found.map(|u| AccountRecord {
            id: u.id.to_string(),
            name: u.name,
            email: u.email,
            password_hash: u.password_hash,
            role: u.role,
            kind: AccountKind::User,
            created_at: u.created_at.with_timezone(&Utc),
        }))
    }
}

struct DocumentAdmins {
    docs: DocStore,
}

#[async_trait]
impl AccountProvider for DocumentAdmins {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>> {
        let found = self.docs.admins().find_by_email(email).await?;
        Ok(found.and_then(|a| {
            // Deactivated admins authenticate like unknown accounts.
            if !a.is_active {
                return None;
            }
            let id = a.id.as_ref().map(ToString::to_string)?;
            Some(AccountRecord {
                id,
                name: a.name,
                email: a.email,
                password_hash: a.password_hash,
                role: a.role,
                kind: AccountKind::Admin,
                created_at: a.created_at,
            })
        }))
    }
}

/// Looks up credentials across account spaces in a fixed order: relational
/// users first, then document-store admins.
#[derive(Clone)]
pub struct AccountResolver {
    providers: Arc<Vec<Box<dyn AccountProvider>>>,
}

impl AccountResolver {
    pub fn new(orm: OrmConn, docs: DocStore) -> Self {
        let providers: Vec<Box<dyn AccountProvider>> = vec![
            Box::new(RelationalUsers { orm }),
            Box::new(DocumentAdmins { docs }),
        ];
        Self {
            providers: Arc::new(providers),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>> {
        for provider in self.providers.iter() {
            if let Some(record) = provider.find_by_email(email).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(plain: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

pub async fn register(
    orm: &OrmConn,
    sessions: &SessionKeys,
    payload: RegisterRequest,
) -> AppResult<(ApiResponse<AuthResponse>, String)> {
    payload.validate()?;
    if payload.password != payload.confirm_password {
        return Err(AppError::validation(
            "confirm_password",
            "Passwords do not match",
        ));
    }

    let exists = entity::users::Entity::find()
        .filter(entity::users::Column::Email.eq(payload.email.as_str()))
        .one(orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let active = entity::users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        email: Set(payload.email),
        password_hash: Set(password_hash),
        role: Set("customer".to_string()),
        created_at: NotSet,
    };

    let user = match active.insert(orm).await {
        Ok(user) => user,
        // A concurrent register with the same email can slip past the
        // pre-check; the unique index reports it here.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let token = sessions.issue(
        user.id.to_string(),
        user.email.clone(),
        user.role.clone(),
        AccountKind::User,
    )?;
    let cookie = sessions.session_cookie(&token);

    let body = ApiResponse::success(
        "User registered",
        AuthResponse {
            user: SessionUser {
                id: user.id.to_string(),
                name: user.name,
                email: user.email,
                role: user.role,
                kind: AccountKind::User,
            },
            token,
        },
        Some(Meta::empty()),
    );
    Ok((body, cookie))
}

pub async fn login(
    accounts: &AccountResolver,
    docs: &DocStore,
    sessions: &SessionKeys,
    payload: LoginRequest,
) -> AppResult<(ApiResponse<AuthResponse>, String)> {
    payload.validate()?;

    // One message for every failure mode so the endpoint does not reveal
    // which emails have accounts.
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let record = accounts
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &record.password_hash)? {
        return Err(invalid());
    }

    if record.kind == AccountKind::Admin {
        if let Err(err) = docs.admins().touch_last_login(&record.id).await {
            tracing::warn!(error = %err, admin_id = %record.id, "failed to record admin login time");
        }
    }

    let token = sessions.issue(
        record.id.clone(),
        record.email.clone(),
        record.role.clone(),
        record.kind,
    )?;
    let cookie = sessions.session_cookie(&token);

    let body = ApiResponse::success(
        "Logged in",
        AuthResponse {
            user: SessionUser {
                id: record.id,
                name: record.name,
                email: record.email,
                role: record.role,
                kind: record.kind,
            },
            token,
        },
        Some(Meta::empty()),
    );
    Ok((body, cookie))
}

pub fn logout(sessions: &SessionKeys) -> (ApiResponse<()>, String) {
    let cookie = sessions.clear_cookie();
    let body = ApiResponse::success("Logged out", (), Some(Meta::empty()));
    (body, cookie)
}

pub async fn profile(
    orm: &OrmConn,
    docs: &DocStore,
    session: &AuthSession,
) -> AppResult<ApiResponse<Profile>> {
    let profile = match session.kind {
        AccountKind::User => {
            let id = session.user_uuid()?;
            let user = entity::users::Entity::find_by_id(id)
                .one(orm)
                .await?
                .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
            Profile {
                id: user.id.to_string(),
                name: user.name,
                email: user.email,
                role: user.role,
                kind: AccountKind::User,
                created_at: user.created_at.with_timezone(&Utc),
            }
        }
        AccountKind::Admin => {
            let admin = docs
                .admins()
                .find_by_id(&session.account_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
            Profile {
                id: session.account_id.clone(),
                name: admin.name,
                email: admin.email,
                role: admin.role,
                kind: AccountKind::Admin,
                created_at: admin.created_at,
            }
        }
    };
    Ok(ApiResponse::success("Profile", profile, Some(Meta::empty())))
}
