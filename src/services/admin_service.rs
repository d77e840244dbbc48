use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::{
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
        users::{CreateUserRequest, UpdateUserRequest, UpdateUserStatusRequest, UserList},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, User},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, UserQuery},
    services::{auth_service::hash_password, order_service::load_order_lines},
};

const DEFAULT_PASSWORD: &str = "password123";

pub async fn list_users(
    pool: &DbPool,
    user: &AuthUser,
    query: UserQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let search = query.q.filter(|q| !q.trim().is_empty());

    let items = sqlx::query_as::<_, User>(
        r#"
        SELECT *
        FROM users
        WHERE ($1::text IS NULL
               OR username ILIKE '%' || $1 || '%'
               OR email ILIKE '%' || $1 || '%'
               OR first_name ILIKE '%' || $1 || '%'
               OR last_name ILIKE '%' || $1 || '%')
        ORDER BY last_name, first_name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(search.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM users
        WHERE ($1::text IS NULL
               OR username ILIKE '%' || $1 || '%'
               OR email ILIKE '%' || $1 || '%'
               OR first_name ILIKE '%' || $1 || '%'
               OR last_name ILIKE '%' || $1 || '%')
        "#,
    )
    .bind(search.as_deref())
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn create_user(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(AppError::Validation("Name fields are required".into()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".into()));
    }

    // Admin-added accounts get the email's local part as their username.
    let username = payload
        .email
        .split('@')
        .next()
        .unwrap_or(payload.email.as_str())
        .to_string();

    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = $1 OR email = $2")
            .bind(&username)
            .bind(&payload.email)
            .fetch_optional(pool)
            .await?;
    if exist.is_some() {
        return Err(AppError::Conflict(
            "A user with this username or email already exists".into(),
        ));
    }

    let password = payload.password.as_deref().unwrap_or(DEFAULT_PASSWORD);
    let password_hash = hash_password(password)?;

    let created: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, first_name, last_name, username, email, password_hash, role, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'active')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&username)
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(payload.role)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "user_create",
        Some("users"),
        Some(serde_json::json!({ "created_user_id": created.id, "role": created.role })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created",
        created,
        Some(Meta::empty()),
    ))
}

pub async fn update_user(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    let first_name = payload.first_name.unwrap_or(existing.first_name);
    let last_name = payload.last_name.unwrap_or(existing.last_name);
    let username = payload.username.unwrap_or(existing.username);
    let email = payload.email.unwrap_or(existing.email);
    let role = payload.role.unwrap_or(existing.role);

    let duplicate: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM users WHERE (username = $1 OR email = $2) AND id != $3",
    )
    .bind(&username)
    .bind(&email)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "A user with this username or email already exists".into(),
        ));
    }

    let updated: User = sqlx::query_as(
        r#"
        UPDATE users
        SET first_name = $2, last_name = $3, username = $4, email = $5, role = $6
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&username)
    .bind(&email)
    .bind(role)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "user_update",
        Some("users"),
        Some(serde_json::json!({ "updated_user_id": updated.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Updated", updated, Some(Meta::empty())))
}

pub async fn set_user_status(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserStatusRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    let updated: Option<User> =
        sqlx::query_as("UPDATE users SET status = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(payload.status)
            .fetch_optional(pool)
            .await?;
    let updated = updated.ok_or(AppError::NotFound)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "user_status",
        Some("users"),
        Some(serde_json::json!({ "updated_user_id": updated.id, "status": updated.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn reset_password(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let password_hash = hash_password(DEFAULT_PASSWORD)?;
    let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(id)
        .bind(&password_hash)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "password_reset",
        Some("users"),
        Some(serde_json::json!({ "reset_user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password reset",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Users referenced by orders or carts are never hard-deleted; deactivate
/// them instead.
pub async fn delete_user(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    let carts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM carts WHERE user_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if orders.0 > 0 || carts.0 > 0 {
        return Err(AppError::Conflict(
            "User has order or cart history; deactivate the account instead".into(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "user_delete",
        Some("users"),
        Some(serde_json::json!({ "deleted_user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_all_orders(
    pool: &DbPool,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let status = query.status.map(|s| s.as_str());

    let items = sqlx::query_as::<_, Order>(
        r#"
        SELECT *
        FROM orders
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY order_date DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
            .bind(status)
            .fetch_one(pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order_admin(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let order = order.ok_or(AppError::NotFound)?;

    let items = load_order_lines(pool, order.cart_id).await?;

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let updated: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(payload.status)
            .fetch_optional(pool)
            .await?;
    let updated = updated.ok_or(AppError::NotFound)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": updated.id, "status": updated.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        updated,
        Some(Meta::empty()),
    ))
}
