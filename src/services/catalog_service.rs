use chrono::Utc;
use validator::Validate;

use crate::{
    docstore::{
        DocStore,
        products::{ProductDoc, ProductPatch, SearchFilter},
    },
    dto::products::{
        CategoryList, CategorySummaryList, CreateProductRequest, ProductList, UpdateProductRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthSession, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, SortDirection},
    state::AppState,
};

pub async fn search_products(
    state: &AppState,
    query: ProductQuery,
    header_dir: Option<&str>,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.page_params();
    let direction = SortDirection::resolve(query.sort_dir.as_deref(), header_dir);

    let filter = SearchFilter {
        text: query.search.clone().filter(|s| !s.trim().is_empty()),
        category: query
            .category
            .clone()
            .filter(|c| !c.trim().is_empty() && !c.eq_ignore_ascii_case("all")),
        ascending: direction.is_ascending(),
        offset,
        limit,
    };

    let (docs, total) = state.docs.products().search(&filter).await?;
    let items: Vec<Product> = docs.into_iter().map(Product::from).collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductList {
        items,
        sort_direction: direction.as_str().to_string(),
    };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: &str) -> AppResult<ApiResponse<Product>> {
    let doc = state
        .docs
        .products()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(ApiResponse::success("Product", Product::from(doc), None))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let categories = state.docs.products().categories().await?;
    Ok(ApiResponse::success(
        "Categories",
        CategoryList { categories },
        Some(Meta::empty()),
    ))
}

pub async fn sales_summary(
    state: &AppState,
    session: &AuthSession,
) -> AppResult<ApiResponse<CategorySummaryList>> {
    ensure_admin(session)?;
    let categories = state.docs.products().category_summary().await?;
    Ok(ApiResponse::success(
        "Sales summary",
        CategorySummaryList { categories },
        Some(Meta::empty()),
    ))
}

pub async fn create_product(
    state: &AppState,
    session: &AuthSession,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(session)?;
    payload.validate()?;

    let now = Utc::now();
    let doc = ProductDoc {
        id: None,
        sku: payload.sku.trim().to_string(),
        name: payload.name,
        price: payload.price,
        category: payload.category,
        stock: payload.stock,
        image: payload.image,
        description: payload.description,
        created_at: now,
        updated_at: now,
    };

    let created = state.docs.products().create(doc).await?;
    Ok(ApiResponse::success(
        "Product created",
        Product::from(created),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    session: &AuthSession,
    id: &str,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(session)?;
    payload.validate()?;

    let repo = state.docs.products();
    let existing = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if let Some(sku) = payload.sku.as_deref() {
        if sku != existing.sku && repo.find_by_sku(sku).await?.is_some() {
            return Err(AppError::Conflict(
                "Product with this SKU already exists".to_string(),
            ));
        }
    }

    let patch = ProductPatch {
        sku: payload.sku,
        name: payload.name,
        price: payload.price,
        category: payload.category,
        stock: payload.stock,
        image: payload.image,
        description: payload.description,
    };

    let updated = repo
        .update(id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(ApiResponse::success(
        "Product updated",
        Product::from(updated),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    session: &AuthSession,
    id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(session)?;
    state
        .docs
        .products()
        .delete(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Current catalog snapshot for a stored product reference. Missing records
/// resolve to None; lookup failures are logged and resolve to None as well so
/// a single bad reference cannot take down a whole listing.
pub async fn resolve_snapshot(docs: &DocStore, product_id: &str) -> Option<Product> {
    match docs.products().find_by_id(product_id).await {
        Ok(found) => found.map(Product::from),
        Err(err) => {
            tracing::warn!(error = %err, product_id, "product snapshot lookup failed");
            None
        }
    }
}
