use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::ProductList,
        reports::{InventoryReportRow, SalesReport, UserActivityRow},
        users::{CreateUserRequest, UpdateUserRequest, UpdateUserStatusRequest, UserList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, User},
    response::ApiResponse,
    routes::params::{
        InventoryReportQuery, LowStockQuery, OrderListQuery, ProductQuery, SalesReportQuery,
        UserActivityQuery, UserQuery,
    },
    services::{admin_service, inventory_service, report_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", axum::routing::put(update_user).delete(delete_user))
        .route("/users/{id}/status", patch(set_user_status))
        .route("/users/{id}/reset-password", post(reset_password))
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/products", get(list_inventory))
        .route("/products/low-stock", get(list_low_stock))
        .route("/reports/sales", get(sales_report))
        .route("/reports/inventory", get(inventory_report))
        .route("/reports/users", get(user_activity_report))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search name, username or email"),
    ),
    responses(
        (status = 200, description = "Users", body = ApiResponse<UserList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    Ok(Json(admin_service::list_users(&state.pool, &user, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = ApiResponse<User>),
        (status = 409, description = "Duplicate username or email"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        admin_service::create_user(&state.pool, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = ApiResponse<User>),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        admin_service::update_user(&state.pool, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/status",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<User>),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn set_user_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserStatusRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        admin_service::set_user_status(&state.pool, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/reset-password",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Password reset to the default"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        admin_service::reset_password(&state.pool, &user, id).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Deleted"),
        (status = 409, description = "User has order or cart history"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        admin_service::delete_user(&state.pool, &user, id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(
        admin_service::list_all_orders(&state.pool, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(
        admin_service::get_order_admin(&state.pool, &user, id).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        admin_service::update_order_status(&state.pool, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Case-insensitive name search"),
    ),
    responses(
        (status = 200, description = "All products including inactive and out of stock", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        inventory_service::list_inventory(&state.pool, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/low-stock",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("threshold" = Option<i32>, Query, description = "Stock threshold, default 5"),
    ),
    responses(
        (status = 200, description = "Low stock products", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        inventory_service::list_low_stock(&state.pool, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/reports/sales",
    params(
        ("from" = Option<String>, Query, description = "Start date (YYYY-MM-DD)"),
        ("to" = Option<String>, Query, description = "End date (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Sales report rows with totals", body = ApiResponse<SalesReport>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn sales_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SalesReportQuery>,
) -> AppResult<Json<ApiResponse<SalesReport>>> {
    Ok(Json(
        report_service::sales_report(&state.pool, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/reports/inventory",
    params(
        ("kind" = Option<String>, Query, description = "all | in_stock | out_of_stock"),
        ("sort_by" = Option<String>, Query, description = "name | price | stock"),
    ),
    responses(
        (status = 200, description = "Inventory snapshot", body = ApiResponse<Vec<InventoryReportRow>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn inventory_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<InventoryReportQuery>,
) -> AppResult<Json<ApiResponse<Vec<InventoryReportRow>>>> {
    Ok(Json(
        report_service::inventory_report(&state.pool, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/reports/users",
    params(
        ("since" = Option<String>, Query, description = "Only count orders on or after this date (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Per-user order counts and totals", body = ApiResponse<Vec<UserActivityRow>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn user_activity_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UserActivityQuery>,
) -> AppResult<Json<ApiResponse<Vec<UserActivityRow>>>> {
    Ok(Json(
        report_service::user_activity_report(&state.pool, &user, query).await?,
    ))
}
