use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::products::ProductList,
    error::{AppError, AppResult},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
};

/// Storefront reads: active products with stock, optional case-insensitive
/// name search. Mutations live in the inventory service.
pub async fn list_available(
    pool: &DbPool,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let search = query.q.filter(|q| !q.trim().is_empty());

    let items = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, price, stock, status, created_at
        FROM products
        WHERE status = 'active'
          AND stock > 0
          AND ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
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
        r#"
        SELECT COUNT(*)
        FROM products
        WHERE status = 'active'
          AND stock > 0
          AND ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
        "#,
    )
    .bind(search.as_deref())
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT id, name, price, stock, status, created_at FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match product {
        Some(p) => Ok(ApiResponse::success("Product", p, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_product_image(pool: &DbPool, id: Uuid) -> AppResult<Vec<u8>> {
    let row: Option<(Option<Vec<u8>>,)> =
        sqlx::query_as("SELECT image FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((Some(bytes),)) => Ok(bytes),
        _ => Err(AppError::NotFound),
    }
}
