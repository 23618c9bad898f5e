//! Embedded document store holding the `product` and `admin` tables.
//!
//! Products and admins live outside the relational store; everything that
//! references them from the relational side does so through plain
//! `table:id` strings with no referential integrity.

pub mod admins;
pub mod products;

pub use admins::AdminRepository;
pub use products::ProductRepository;

use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::{RecordId, Surreal};
use thiserror::Error;

const NAMESPACE: &str = "storefront";
const DATABASE: &str = "storefront";

const SCHEMA: &str = "\
    DEFINE TABLE IF NOT EXISTS product SCHEMALESS;\
    DEFINE INDEX IF NOT EXISTS product_sku_unique ON TABLE product COLUMNS sku UNIQUE;\
    DEFINE TABLE IF NOT EXISTS admin SCHEMALESS;\
    DEFINE INDEX IF NOT EXISTS admin_email_unique ON TABLE admin COLUMNS email UNIQUE;\
";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Clone)]
pub struct DocStore {
    db: Surreal<Db>,
}

impl DocStore {
    /// Open the on-disk store used by the service binaries.
    pub async fn open(path: &str) -> RepoResult<Self> {
        let db = Surreal::new::<RocksDb>(path).await?;
        Self::init(db).await
    }

    /// Open a throwaway in-memory store, used by tests.
    pub async fn open_memory() -> RepoResult<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> RepoResult<Self> {
        db.use_ns(NAMESPACE).use_db(DATABASE).await?;
        db.query(SCHEMA).await?.check()?;
        Ok(Self { db })
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.db.clone())
    }

    pub fn admins(&self) -> AdminRepository {
        AdminRepository::new(self.db.clone())
    }
}

/// Parse an id string from the wire into a record id for `table`.
///
/// Accepts both the canonical `table:key` form and a bare key. Returns
/// `None` for ids that cannot belong to the table; callers treat that the
/// same as a missing record, which is what the weak cross-store reference
/// contract wants.
pub(crate) fn parse_record_id(table: &str, raw: &str) -> Option<RecordId> {
    match raw.split_once(':') {
        Some((t, key)) if t == table && !key.is_empty() => Some(RecordId::from((t, key))),
        Some(_) => None,
        None if raw.is_empty() => None,
        None => Some(RecordId::from((table, raw))),
    }
}
