use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::products::{
        CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest,
        UpdateProductStatusRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, ProductQuery},
};

/// Admin inventory listing: every product regardless of status or stock,
/// with the same optional name search as the storefront.
pub async fn list_inventory(
    pool: &DbPool,
    user: &AuthUser,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let search = query.q.filter(|q| !q.trim().is_empty());

    let items = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, price, stock, status, created_at
        FROM products
        WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
        ORDER BY name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(search.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')",
    )
    .bind(search.as_deref())
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Inventory", ProductList { items }, Some(meta)))
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price <= Decimal::ZERO {
        return Err(AppError::Validation("Price must be greater than 0".into()));
    }
    Ok(())
}

pub async fn create_product(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("Product name is required".into()));
    }
    validate_price(payload.price)?;
    if payload.stock < 0 {
        return Err(AppError::Validation("Stock cannot be negative".into()));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
        .bind(payload.name.trim())
        .fetch_optional(pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict(
            "A product with this name already exists".into(),
        ));
    }

    let product: Product = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, price, stock, status, image)
        VALUES ($1, $2, $3, $4, 'active', $5)
        RETURNING id, name, price, stock, status, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.name.trim())
    .bind(payload.price)
    .bind(payload.stock)
    .bind(payload.image)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id, "name": product.name })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing: Option<Product> = sqlx::query_as(
        "SELECT id, name, price, stock, status, created_at FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    let name = payload.name.unwrap_or(existing.name);
    let price = payload.price.unwrap_or(existing.price);
    let stock = payload.stock.unwrap_or(existing.stock);
    let status = payload.status.unwrap_or(existing.status);

    validate_price(price)?;
    if stock < 0 {
        return Err(AppError::Validation("Stock cannot be negative".into()));
    }

    let duplicate: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM products WHERE name = $1 AND id != $2")
            .bind(name.trim())
            .bind(id)
            .fetch_optional(pool)
            .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "A product with this name already exists".into(),
        ));
    }

    let product: Product = sqlx::query_as(
        r#"
        UPDATE products
        SET name = $2, price = $3, stock = $4, status = $5,
            image = COALESCE($6, image)
        WHERE id = $1
        RETURNING id, name, price, stock, status, created_at
        "#,
    )
    .bind(id)
    .bind(name.trim())
    .bind(price)
    .bind(stock)
    .bind(status)
    .bind(payload.image)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn set_product_status(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductStatusRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let product: Option<Product> = sqlx::query_as(
        r#"
        UPDATE products SET status = $2
        WHERE id = $1
        RETURNING id, name, price, stock, status, created_at
        "#,
    )
    .bind(id)
    .bind(payload.status)
    .fetch_optional(pool)
    .await?;
    let product = product.ok_or(AppError::NotFound)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_status",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id, "status": product.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn adjust_inventory(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::Validation("Delta must not be 0".into()));
    }

    let mut tx = pool.begin().await?;

    let product: Option<Product> = sqlx::query_as(
        "SELECT id, name, price, stock, status, created_at FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let product = product.ok_or(AppError::NotFound)?;

    let new_stock = product.stock + payload.delta;
    if new_stock < 0 {
        return Err(AppError::Validation("Stock cannot be negative".into()));
    }

    let updated: Product = sqlx::query_as(
        r#"
        UPDATE products SET stock = $2
        WHERE id = $1
        RETURNING id, name, price, stock, status, created_at
        "#,
    )
    .bind(id)
    .bind(new_stock)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "inventory_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": updated.id, "delta": payload.delta })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Inventory updated",
        updated,
        Some(Meta::empty()),
    ))
}

/// Deletion is blocked while any cart line still references the product;
/// deactivation is the supported soft path.
pub async fn delete_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let references: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE product_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
    if references.0 > 0 {
        return Err(AppError::Conflict(
            "Product is referenced by carts; deactivate it instead".into(),
        ));
    }

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
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

pub async fn list_low_stock(
    pool: &DbPool,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination().normalize();

    let items = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, price, stock, status, created_at
        FROM products
        WHERE stock <= $1
        ORDER BY stock ASC, name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(threshold)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE stock <= $1")
        .bind(threshold)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}
