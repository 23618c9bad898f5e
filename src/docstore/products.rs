use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{RepoError, RepoResult, parse_record_id};
use crate::models::CategorySummary;

pub const TABLE: &str = "product";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub stock: i64,
    pub image: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub text: Option<String>,
    pub category: Option<String>,
    pub ascending: bool,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub stock: Option<i64>,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct ProductRepository {
    db: Surreal<Db>,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    /// Find a product by its wire id. Ids that cannot parse into a record of
    /// the product table resolve like a missing record.
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<ProductDoc>> {
        let Some(record) = parse_record_id(TABLE, id) else {
            return Ok(None);
        };
        let product: Option<ProductDoc> = self.db.select(record).await?;
        Ok(product)
    }

    pub async fn find_by_sku(&self, sku: &str) -> RepoResult<Option<ProductDoc>> {
        let sku_owned = sku.to_string();
        let mut result = self
            .db
            .query(format!("SELECT * FROM {TABLE} WHERE sku = $sku"))
            .bind(("sku", sku_owned))
            .await?;
        let products: Vec<ProductDoc> = result.take(0)?;
        Ok(products.into_iter().next())
    }

    pub async fn create(&self, doc: ProductDoc) -> RepoResult<ProductDoc> {
        if self.find_by_sku(&doc.sku).await?.is_some() {
            return Err(RepoError::Duplicate(
                "Product with this SKU already exists".to_string(),
            ));
        }

        let created: Option<ProductDoc> = self.db.create(TABLE).content(doc).await?;
        created.ok_or_else(|| RepoError::Database("create returned no product".to_string()))
    }

    /// Filtered catalog search ordered by price.
    ///
    /// The embedded engine is unreliable when WHERE, ORDER BY and LIMIT are
    /// combined in one statement, so the full ordered match set is fetched
    /// and the page is cut in memory. Returns the page plus the total match
    /// count.
    pub async fn search(&self, filter: &SearchFilter) -> RepoResult<(Vec<ProductDoc>, i64)> {
        let mut conditions: Vec<&str> = Vec::new();
        if filter.text.is_some() {
            conditions.push(
                "(string::lowercase(name) CONTAINS $needle OR string::lowercase(sku) CONTAINS $needle)",
            );
        }
        if filter.category.is_some() {
            conditions.push("category = $category");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let direction = if filter.ascending { "ASC" } else { "DESC" };
        let sql = format!("SELECT * FROM {TABLE}{where_clause} ORDER BY price {direction}");

        let mut query = self.db.query(sql);
        if let Some(text) = &filter.text {
            query = query.bind(("needle", text.to_lowercase()));
        }
        if let Some(category) = &filter.category {
            query = query.bind(("category", category.clone()));
        }

        let mut result = query.await?;
        let matches: Vec<ProductDoc> = result.take(0)?;
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    pub async fn categories(&self) -> RepoResult<Vec<String>> {
        #[derive(Deserialize)]
        struct Row {
            category: String,
        }

        let mut result = self
            .db
            .query(format!("SELECT category FROM {TABLE} GROUP BY category"))
            .await?;
        let rows: Vec<Row> = result.take(0)?;
        let mut categories: Vec<String> = rows.into_iter().map(|r| r.category).collect();
        categories.sort();
        Ok(categories)
    }

    pub async fn category_summary(&self) -> RepoResult<Vec<CategorySummary>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT category, count() AS count, math::mean(price) AS avg_price, \
                 math::min(price) AS min_price, math::max(price) AS max_price \
                 FROM {TABLE} GROUP BY category"
            ))
            .await?;
        let mut rows: Vec<CategorySummary> = result.take(0)?;
        rows.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(rows)
    }

    pub async fn update(&self, id: &str, patch: ProductPatch) -> RepoResult<Option<ProductDoc>> {
        let Some(record) = parse_record_id(TABLE, id) else {
            return Ok(None);
        };

        let mut set_parts: Vec<&str> = vec!["updated_at = $updated_at"];
        if patch.sku.is_some() {
            set_parts.push("sku = $sku");
        }
        if patch.name.is_some() {
            set_parts.push("name = $name");
        }
        if patch.price.is_some() {
            set_parts.push("price = $price");
        }
        if patch.category.is_some() {
            set_parts.push("category = $category");
        }
        if patch.stock.is_some() {
            set_parts.push("stock = $stock");
        }
        if patch.image.is_some() {
            set_parts.push("image = $image");
        }
        if patch.description.is_some() {
            set_parts.push("description = $description");
        }

        let sql = format!("UPDATE $product SET {} RETURN AFTER", set_parts.join(", "));
        let mut query = self
            .db
            .query(sql)
            .bind(("product", record))
            .bind(("updated_at", Utc::now()));
        if let Some(sku) = patch.sku {
            query = query.bind(("sku", sku));
        }
        if let Some(name) = patch.name {
            query = query.bind(("name", name));
        }
        if let Some(price) = patch.price {
            query = query.bind(("price", price));
        }
        if let Some(category) = patch.category {
            query = query.bind(("category", category));
        }
        if let Some(stock) = patch.stock {
            query = query.bind(("stock", stock));
        }
        if let Some(image) = patch.image {
            query = query.bind(("image", image));
        }
        if let Some(description) = patch.description {
            query = query.bind(("description", description));
        }

        let mut result = query.await?;
        let updated: Vec<ProductDoc> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    pub async fn delete(&self, id: &str) -> RepoResult<Option<ProductDoc>> {
        let Some(record) = parse_record_id(TABLE, id) else {
            return Ok(None);
        };
        let removed: Option<ProductDoc> = self.db.delete(record).await?;
        Ok(removed)
    }

    /// Guarded stock decrement: applies `stock -= quantity` only while
    /// enough stock remains, in a single statement. Returns whether the
    /// decrement was applied.
    pub async fn try_decrement_stock(&self, id: &str, quantity: i64) -> RepoResult<bool> {
        let Some(record) = parse_record_id(TABLE, id) else {
            return Ok(false);
        };
        let mut result = self
            .db
            .query(
                "UPDATE $product SET stock -= $quantity, updated_at = $updated_at \
                 WHERE stock >= $quantity RETURN AFTER",
            )
            .bind(("product", record))
            .bind(("quantity", quantity))
            .bind(("updated_at", Utc::now()))
            .await?;
        let updated: Vec<ProductDoc> = result.take(0)?;
        Ok(!updated.is_empty())
    }
}
