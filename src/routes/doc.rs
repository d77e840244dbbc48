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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{
            CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest,
            UpdateProductStatusRequest,
        },
        reports::{InventoryReportRow, SalesReport, SalesReportRow, UserActivityRow},
        users::{CreateUserRequest, UpdateUserRequest, UpdateUserStatusRequest, UserList},
    },
    models::{Cart, CartItem, Order, Product, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, params, products},
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
        products::list_products,
        products::get_product,
        products::get_product_image,
        products::create_product,
        products::update_product,
        products::set_product_status,
        products::adjust_inventory,
        products::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        admin::list_users,
        admin::create_user,
        admin::update_user,
        admin::set_user_status,
        admin::reset_password,
        admin::delete_user,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_inventory,
        admin::list_low_stock,
        admin::sales_report,
        admin::inventory_report,
        admin::user_activity_report,
    ),
    components(
        schemas(
            User,
            Product,
            Cart,
            CartItem,
            Order,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartLine,
            CartView,
            OrderList,
            OrderWithItems,
            UpdateOrderStatusRequest,
            CreateProductRequest,
            UpdateProductRequest,
            UpdateProductStatusRequest,
            InventoryAdjustRequest,
            ProductList,
            CreateUserRequest,
            UpdateUserRequest,
            UpdateUserStatusRequest,
            UserList,
            SalesReport,
            SalesReportRow,
            InventoryReportRow,
            UserActivityRow,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<UserList>,
            ApiResponse<SalesReport>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog and inventory endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Admin", description = "User management, order management and reports"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
