use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{DailyRevenueList, OrderDetail, OrderList, OrderWithItems, PlaceOrderRequest, TopCustomerList},
    error::AppResult,
    middleware::auth::AuthSession,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(all_orders))
        .route("/", post(place_order))
        .route("/my-orders", get(my_orders))
        .route("/reports/daily-revenue", get(daily_revenue))
        .route("/reports/top-customers", get(top_customers))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty order or insufficient stock"),
        (status = 404, description = "A requested product does not exist")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderWithItems>>)> {
    let resp = order_service::place_order(&state, &session, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders/my-orders",
    responses(
        (status = 200, description = "Current user's orders, newest first", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::my_orders(&state, &session).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "All orders, newest first", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn all_orders(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::all_orders(&state, &session).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/reports/daily-revenue",
    responses(
        (status = 200, description = "Revenue per day, newest first", body = ApiResponse<DailyRevenueList>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn daily_revenue(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<ApiResponse<DailyRevenueList>>> {
    let resp = order_service::daily_revenue(&state, &session).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/reports/top-customers",
    responses(
        (status = 200, description = "Top customers by lifetime spend", body = ApiResponse<TopCustomerList>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn top_customers(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<ApiResponse<TopCustomerList>>> {
    let resp = order_service::top_customers(&state, &session).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    responses(
        (status = 200, description = "Order with line details", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Not the order's owner"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let resp = order_service::get_order(&state, &session, id).await?;
    Ok(Json(resp))
}
