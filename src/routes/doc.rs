use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, Profile, RegisterRequest, SessionUser},
        cart::{AddItemRequest, CartItemUpdate, CartLine, CartView, UpdateQuantityRequest},
        orders::{
            DailyRevenue, DailyRevenueList, LineItemRequest, OrderDetail, OrderLineDetail,
            OrderList, OrderWithItems, PlaceOrderRequest, TopCustomer, TopCustomerList,
        },
        products::{
            CategoryList, CategorySummaryList, CreateProductRequest, ProductList,
            UpdateProductRequest,
        },
    },
    models::{Cart, CategorySummary, Order, OrderLine, Product, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        products::list_products,
        products::list_categories,
        products::sales_summary,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::view_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::place_order,
        orders::my_orders,
        orders::all_orders,
        orders::daily_revenue,
        orders::top_customers,
        orders::get_order
    ),
    components(
        schemas(
            User,
            Product,
            CategorySummary,
            Cart,
            Order,
            OrderLine,
            RegisterRequest,
            LoginRequest,
            SessionUser,
            AuthResponse,
            Profile,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CategoryList,
            CategorySummaryList,
            AddItemRequest,
            UpdateQuantityRequest,
            CartLine,
            CartView,
            CartItemUpdate,
            PlaceOrderRequest,
            LineItemRequest,
            OrderWithItems,
            OrderLineDetail,
            OrderDetail,
            OrderList,
            DailyRevenue,
            DailyRevenueList,
            TopCustomer,
            TopCustomerList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and session endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order and report endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
