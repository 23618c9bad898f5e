use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Order, OrderLine, Product};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    #[validate(nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LineItemRequest {
    #[validate(length(min = 1, message = "Product id is required"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

/// Order line joined with the current catalog snapshot. `product` is null when
/// the record has been deleted since purchase; `price_at_purchase` stays
/// authoritative either way.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineDetail {
    pub id: Uuid,
    pub product_id: String,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub product: Option<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderLineDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct TopCustomer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub order_count: i64,
    pub total_spent: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyRevenueList {
    pub days: Vec<DailyRevenue>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopCustomerList {
    pub customers: Vec<TopCustomer>,
}
