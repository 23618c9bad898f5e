use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{RepoError, RepoResult, parse_record_id};

pub const TABLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AdminRepository {
    db: Surreal<Db>,
}

impl AdminRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<AdminDoc>> {
        let Some(record) = parse_record_id(TABLE, id) else {
            return Ok(None);
        };
        let admin: Option<AdminDoc> = self.db.select(record).await?;
        Ok(admin)
    }

    pub async fn find_by_email(&self, email: &str) -> RepoResult<Option<AdminDoc>> {
        let email_owned = email.to_string();
        let mut result = self
            .db
            .query(format!("SELECT * FROM {TABLE} WHERE email = $email"))
            .bind(("email", email_owned))
            .await?;
        let admins: Vec<AdminDoc> = result.take(0)?;
        Ok(admins.into_iter().next())
    }

    pub async fn create(&self, doc: AdminDoc) -> RepoResult<AdminDoc> {
        if self.find_by_email(&doc.email).await?.is_some() {
            return Err(RepoError::Duplicate(
                "Admin with this email already exists".to_string(),
            ));
        }

        let created: Option<AdminDoc> = self.db.create(TABLE).content(doc).await?;
        created.ok_or_else(|| RepoError::Database("create returned no admin".to_string()))
    }

    pub async fn touch_last_login(&self, id: &str) -> RepoResult<()> {
        let Some(record) = parse_record_id(TABLE, id) else {
            return Err(RepoError::Validation(format!("invalid admin id: {id}")));
        };
        self.db
            .query("UPDATE $admin SET last_login = $last_login")
            .bind(("admin", record))
            .bind(("last_login", Utc::now()))
            .await?
            .check()?;
        Ok(())
    }
}
