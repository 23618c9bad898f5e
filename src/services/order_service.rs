use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::OrmConn,
    docstore::products::ProductDoc,
    dto::orders::{
        DailyRevenue, DailyRevenueList, OrderDetail, OrderLineDetail, OrderList, OrderWithItems,
        PlaceOrderRequest, TopCustomer, TopCustomerList,
    },
    entity,
    error::{AppError, AppResult},
    middleware::auth::{AuthSession, ensure_admin},
    models::{Order, OrderLine},
    response::{ApiResponse, Meta},
    services::catalog_service::resolve_snapshot,
    state::AppState,
};

struct ValidatedLine {
    product_id: String,
    quantity: i32,
    unit_price: f64,
}

fn to_money(value: f64) -> AppResult<Decimal> {
    let amount = Decimal::try_from(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid money amount: {e}")))?;
    Ok(amount.round_dp(2))
}

/// Validates every requested line against the live catalog, writes the order
/// and its lines in one relational transaction, then applies guarded stock
/// decrements against the catalog. A decrement that no longer fits is
/// recorded in stock_failures instead of failing the committed order.
pub async fn place_order(
    state: &AppState,
    session: &AuthSession,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let user_id = session.user_uuid()?;
    payload.validate()?;
    if payload.items.is_empty() {
        return Err(AppError::EmptyOrder);
    }

    let mut catalog: HashMap<String, ProductDoc> = HashMap::new();
    let mut lines: Vec<ValidatedLine> = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = match catalog.get(&item.product_id) {
            Some(p) => p.clone(),
            None => {
                let p = state
                    .docs
                    .products()
                    .find_by_id(&item.product_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Product {} not found", item.product_id))
                    })?;
                catalog.insert(item.product_id.clone(), p.clone());
                p
            }
        };
        if i64::from(item.quantity) > product.stock {
            return Err(AppError::InsufficientStock {
                product: product.name,
                available: product.stock,
                cart_item_id: None,
            });
        }
        lines.push(ValidatedLine {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price: product.price,
        });
    }

    let total: f64 = lines
        .iter()
        .map(|l| l.unit_price * f64::from(l.quantity))
        .sum();
    let order_total = to_money(total)?;

    let txn = state.orm.begin().await?;
    let order = entity::orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total: Set(order_total),
        status: Set("completed".to_string()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_lines: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in &lines {
        // Price is frozen here; later catalog edits must not change it.
        let price = to_money(line.unit_price)?;
        let item = entity::order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id.clone()),
            quantity: Set(line.quantity),
            price_at_purchase: Set(price),
        }
        .insert(&txn)
        .await?;
        order_lines.push(OrderLine::from(item));
    }
    txn.commit().await?;

    // The catalog lives outside the relational transaction, so decrements
    // happen after commit. The guard keeps stock from going negative when a
    // concurrent order won the race; losers land in stock_failures.
    for line in &lines {
        match state
            .docs
            .products()
            .try_decrement_stock(&line.product_id, i64::from(line.quantity))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                record_stock_failure(
                    &state.orm,
                    order.id,
                    &line.product_id,
                    line.quantity,
                    "insufficient stock at decrement",
                )
                .await;
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    order_id = %order.id,
                    product_id = %line.product_id,
                    "stock decrement query failed"
                );
                record_stock_failure(
                    &state.orm,
                    order.id,
                    &line.product_id,
                    line.quantity,
                    "decrement query failed",
                )
                .await;
            }
        }
    }

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: Order::from(order),
            items: order_lines,
        },
        Some(Meta::empty()),
    ))
}

async fn record_stock_failure(
    orm: &OrmConn,
    order_id: Uuid,
    product_id: &str,
    quantity: i32,
    reason: &str,
) {
    tracing::error!(%order_id, product_id, quantity, reason, "stock decrement failed");
    let active = entity::stock_failures::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(product_id.to_string()),
        quantity: Set(quantity),
        reason: Set(reason.to_string()),
        created_at: NotSet,
    };
    if let Err(err) = active.insert(orm).await {
        tracing::warn!(error = %err, %order_id, "stock failure insert failed");
    }
}

/// Order lookup that does not reveal existence to callers who would not be
/// allowed to read the order anyway.
pub async fn get_order(
    state: &AppState,
    session: &AuthSession,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let found = entity::orders::Entity::find_by_id(id).one(&state.orm).await?;

    let order = if session.is_admin() {
        found.ok_or_else(|| AppError::NotFound("Order not found".to_string()))?
    } else {
        let user_id = session.user_uuid()?;
        match found {
            Some(order) if order.user_id == user_id => order,
            _ => return Err(AppError::Forbidden("Unauthorized".to_string())),
        }
    };

    let rows = entity::order_items::Entity::find()
        .filter(entity::order_items::Column::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let product = resolve_snapshot(&state.docs, &row.product_id).await;
        items.push(OrderLineDetail {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            price_at_purchase: row.price_at_purchase,
            product,
        });
    }

    let detail = OrderDetail {
        order: Order::from(order),
        items,
    };
    Ok(ApiResponse::success("Order", detail, Some(Meta::empty())))
}

async fn with_lines(
    orm: &OrmConn,
    orders: Vec<entity::orders::Model>,
) -> AppResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for item in entity::order_items::Entity::find()
        .filter(entity::order_items::Column::OrderId.is_in(order_ids))
        .all(orm)
        .await?
    {
        grouped
            .entry(item.order_id)
            .or_default()
            .push(OrderLine::from(item));
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems {
                order: Order::from(order),
                items,
            }
        })
        .collect())
}

pub async fn my_orders(
    state: &AppState,
    session: &AuthSession,
) -> AppResult<ApiResponse<OrderList>> {
    let user_id = session.user_uuid()?;
    let orders = entity::orders::Entity::find()
        .filter(entity::orders::Column::UserId.eq(user_id))
        .order_by_desc(entity::orders::Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let items = with_lines(&state.orm, orders).await?;
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::empty()),
    ))
}

pub async fn all_orders(
    state: &AppState,
    session: &AuthSession,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(session)?;
    let orders = entity::orders::Entity::find()
        .order_by_desc(entity::orders::Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let items = with_lines(&state.orm, orders).await?;
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::empty()),
    ))
}

pub async fn daily_revenue(
    state: &AppState,
    session: &AuthSession,
) -> AppResult<ApiResponse<DailyRevenueList>> {
    ensure_admin(session)?;
    let days = sqlx::query_as::<_, DailyRevenue>(
        r#"
        SELECT created_at::date AS date, SUM(total) AS revenue
        FROM orders
        GROUP BY created_at::date
        ORDER BY created_at::date DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Daily revenue",
        DailyRevenueList { days },
        Some(Meta::empty()),
    ))
}

pub async fn top_customers(
    state: &AppState,
    session: &AuthSession,
) -> AppResult<ApiResponse<TopCustomerList>> {
    ensure_admin(session)?;
    // LEFT JOIN plus COALESCE keeps customers with no orders in the list at
    // zero spend instead of dropping or nulling them.
    let customers = sqlx::query_as::<_, TopCustomer>(
        r#"
        SELECT u.id, u.name, u.email,
               COUNT(o.id) AS order_count,
               COALESCE(SUM(o.total), 0) AS total_spent
        FROM users u
        LEFT JOIN orders o ON o.user_id = u.id
        GROUP BY u.id, u.name, u.email
        ORDER BY total_spent DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Top customers",
        TopCustomerList { customers },
        Some(Meta::empty()),
    ))
}
