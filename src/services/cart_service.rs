use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, QueryOrder, Set, SqlErr,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::OrmConn,
    dto::cart::{AddItemRequest, CartItemUpdate, CartLine, CartView, UpdateQuantityRequest},
    entity,
    error::{AppError, AppResult},
    middleware::auth::AuthSession,
    models::{Cart, Product},
    response::{ApiResponse, Meta},
    services::catalog_service::resolve_snapshot,
    state::AppState,
};

/// The cart surface belongs to customer accounts. Admin sessions are turned
/// away before any cart row is touched.
fn ensure_customer(session: &AuthSession) -> Result<Uuid, AppError> {
    if session.is_admin() {
        return Err(AppError::Forbidden(
            "Admins cannot access cart functionality".to_string(),
        ));
    }
    session.user_uuid()
}

async fn get_or_create_cart(orm: &OrmConn, user_id: Uuid) -> AppResult<entity::carts::Model> {
    if let Some(cart) = entity::carts::Entity::find()
        .filter(entity::carts::Column::UserId.eq(user_id))
        .one(orm)
        .await?
    {
        return Ok(cart);
    }

    let active = entity::carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: NotSet,
        updated_at: NotSet,
    };
    match active.insert(orm).await {
        Ok(cart) => Ok(cart),
        // A concurrent request created the cart between the read and the
        // insert; the unique index on user_id makes the re-read safe.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            entity::carts::Entity::find()
                .filter(entity::carts::Column::UserId.eq(user_id))
                .one(orm)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!("cart missing after unique violation"))
                })
        }
        Err(err) => Err(err.into()),
    }
}

async fn touch_cart(orm: &OrmConn, cart_id: Uuid) -> AppResult<()> {
    let active = entity::carts::ActiveModel {
        id: Set(cart_id),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    active.update(orm).await?;
    Ok(())
}

fn line_from_entity(model: entity::cart_items::Model, product: Option<Product>) -> CartLine {
    CartLine {
        id: model.id,
        product_id: model.product_id,
        quantity: model.quantity,
        added_at: model.added_at.with_timezone(&Utc),
        product,
    }
}

pub async fn view_cart(
    state: &AppState,
    session: &AuthSession,
) -> AppResult<ApiResponse<CartView>> {
    let user_id = ensure_customer(session)?;
    let cart = get_or_create_cart(&state.orm, user_id).await?;

    let rows = entity::cart_items::Entity::find()
        .filter(entity::cart_items::Column::CartId.eq(cart.id))
        .order_by_desc(entity::cart_items::Column::AddedAt)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let product = resolve_snapshot(&state.docs, &row.product_id).await;
        items.push(line_from_entity(row, product));
    }

    let view = CartView {
        cart: Cart::from(cart),
        items,
    };
    Ok(ApiResponse::success("Cart", view, Some(Meta::empty())))
}

pub async fn add_item(
    state: &AppState,
    session: &AuthSession,
    payload: AddItemRequest,
) -> AppResult<ApiResponse<CartLine>> {
    let user_id = ensure_customer(session)?;
    payload.validate()?;

    let product = state
        .docs
        .products()
        .find_by_id(&payload.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let cart = get_or_create_cart(&state.orm, user_id).await?;

    let existing = entity::cart_items::Entity::find()
        .filter(entity::cart_items::Column::CartId.eq(cart.id))
        .filter(entity::cart_items::Column::ProductId.eq(payload.product_id.as_str()))
        .one(&state.orm)
        .await?;

    let insufficient = || AppError::InsufficientStock {
        product: product.name.clone(),
        available: product.stock,
        cart_item_id: None,
    };

    let line = match existing {
        Some(line) => {
            let merged = line.quantity + payload.quantity;
            if i64::from(merged) > product.stock {
                return Err(insufficient());
            }
            let mut active: entity::cart_items::ActiveModel = line.into();
            active.quantity = Set(merged);
            active.update(&state.orm).await?
        }
        None => {
            if i64::from(payload.quantity) > product.stock {
                return Err(insufficient());
            }
            let active = entity::cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(payload.product_id.clone()),
                quantity: Set(payload.quantity),
                added_at: NotSet,
            };
            match active.insert(&state.orm).await {
                Ok(line) => line,
                // A concurrent add for the same product hit the unique
                // (cart_id, product_id) index first; merge into that line.
                Err(err)
                    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
                {
                    let line = entity::cart_items::Entity::find()
                        .filter(entity::cart_items::Column::CartId.eq(cart.id))
                        .filter(
                            entity::cart_items::Column::ProductId
                                .eq(payload.product_id.as_str()),
                        )
                        .one(&state.orm)
                        .await?
                        .ok_or_else(|| {
                            AppError::Internal(anyhow::anyhow!(
                                "cart item missing after unique violation"
                            ))
                        })?;
                    let merged = line.quantity + payload.quantity;
                    if i64::from(merged) > product.stock {
                        return Err(insufficient());
                    }
                    let mut active: entity::cart_items::ActiveModel = line.into();
                    active.quantity = Set(merged);
                    active.update(&state.orm).await?
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    touch_cart(&state.orm, cart.id).await?;

    let snapshot = Some(Product::from(product));
    Ok(ApiResponse::success(
        "Item added to cart",
        line_from_entity(line, snapshot),
        Some(Meta::empty()),
    ))
}

pub async fn update_item(
    state: &AppState,
    session: &AuthSession,
    item_id: Uuid,
    payload: UpdateQuantityRequest,
) -> AppResult<ApiResponse<CartItemUpdate>> {
    let user_id = ensure_customer(session)?;

    let cart = entity::carts::Entity::find()
        .filter(entity::carts::Column::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

    let line = entity::cart_items::Entity::find_by_id(item_id)
        .filter(entity::cart_items::Column::CartId.eq(cart.id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

    // Zero or negative quantity removes the line instead of failing.
    if payload.quantity <= 0 {
        let active: entity::cart_items::ActiveModel = line.into();
        active.delete(&state.orm).await?;
        touch_cart(&state.orm, cart.id).await?;
        let update = CartItemUpdate {
            cart_item: None,
            removed: true,
        };
        return Ok(ApiResponse::success(
            "Cart item removed",
            update,
            Some(Meta::empty()),
        ));
    }

    let product = state
        .docs
        .products()
        .find_by_id(&line.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if i64::from(payload.quantity) > product.stock {
        return Err(AppError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            cart_item_id: Some(line.id),
        });
    }

    let mut active: entity::cart_items::ActiveModel = line.into();
    active.quantity = Set(payload.quantity);
    let updated = active.update(&state.orm).await?;
    touch_cart(&state.orm, cart.id).await?;

    let update = CartItemUpdate {
        cart_item: Some(line_from_entity(updated, Some(Product::from(product)))),
        removed: false,
    };
    Ok(ApiResponse::success(
        "Cart item updated",
        update,
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    session: &AuthSession,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user_id = ensure_customer(session)?;

    let cart = entity::carts::Entity::find()
        .filter(entity::carts::Column::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

    let result = entity::cart_items::Entity::delete_many()
        .filter(entity::cart_items::Column::Id.eq(item_id))
        .filter(entity::cart_items::Column::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Cart item not found".to_string()));
    }

    touch_cart(&state.orm, cart.id).await?;
    Ok(ApiResponse::success(
        "Item removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    session: &AuthSession,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user_id = ensure_customer(session)?;

    // Clearing an absent cart is a no-op, not an error.
    let Some(cart) = entity::carts::Entity::find()
        .filter(entity::carts::Column::UserId.eq(user_id))
        .one(&state.orm)
        .await?
    else {
        return Ok(ApiResponse::success(
            "Cart cleared",
            serde_json::json!({}),
            Some(Meta::empty()),
        ));
    };

    entity::cart_items::Entity::delete_many()
        .filter(entity::cart_items::Column::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;
    touch_cart(&state.orm, cart.id).await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
