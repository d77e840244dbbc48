use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartLine, CartView},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem, Product, ProductStatus},
    money::{line_subtotal, round_money},
    response::{ApiResponse, Meta},
};

/// A user has at most one active cart; it is created lazily on the first add
/// after signup or checkout. The partial unique index on carts absorbs
/// double-submit races, so the second of two concurrent creates re-reads the
/// winner's row.
async fn fetch_or_create_active_cart(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Cart> {
    let existing: Option<Cart> =
        sqlx::query_as("SELECT * FROM carts WHERE user_id = $1 AND status = 'active'")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(cart) = existing {
        return Ok(cart);
    }

    let inserted: Option<Cart> = sqlx::query_as(
        r#"
        INSERT INTO carts (id, user_id, status)
        VALUES ($1, $2, 'active')
        ON CONFLICT (user_id) WHERE status = 'active' DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(cart) = inserted {
        return Ok(cart);
    }

    let cart: Option<Cart> =
        sqlx::query_as("SELECT * FROM carts WHERE user_id = $1 AND status = 'active'")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    cart.ok_or_else(|| AppError::Conflict("Could not allocate an active cart".into()))
}

async fn product_for_update(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Product> {
    let product: Option<Product> = sqlx::query_as(
        "SELECT id, name, price, stock, status, created_at FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    product.ok_or(AppError::NotFound)
}

pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "Quantity must be greater than 0".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let product = product_for_update(&mut tx, payload.product_id).await?;
    if product.status != ProductStatus::Active {
        return Err(AppError::ProductInactive(product.name));
    }

    let cart = fetch_or_create_active_cart(&mut tx, user.user_id).await?;

    let existing: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart.id)
            .bind(product.id)
            .fetch_optional(&mut *tx)
            .await?;

    // Re-adding a product sums quantities; the stock check applies to the
    // new total, not just the increment.
    let new_quantity = existing.map_or(0, |(q,)| q) + payload.quantity;
    if new_quantity > product.stock {
        return Err(AppError::InsufficientStock {
            product: product.name,
        });
    }

    let item: CartItem = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart.id)
    .bind(product.id)
    .bind(new_quantity)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": item.product_id, "quantity": item.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Added to cart", item, None))
}

pub async fn update_cart_item(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
    new_quantity: i32,
) -> AppResult<ApiResponse<CartView>> {
    if new_quantity <= 0 {
        remove_from_cart(pool, user, product_id).await?;
        let view = load_cart_view(pool, user.user_id).await?;
        return Ok(ApiResponse::success("Item removed", view, None));
    }

    let mut tx = pool.begin().await?;

    let cart: Option<Cart> =
        sqlx::query_as("SELECT * FROM carts WHERE user_id = $1 AND status = 'active'")
            .bind(user.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let cart = cart.ok_or(AppError::NotFound)?;

    let product = product_for_update(&mut tx, product_id).await?;
    if product.status != ProductStatus::Active {
        return Err(AppError::ProductInactive(product.name));
    }
    if new_quantity > product.stock {
        return Err(AppError::InsufficientStock {
            product: product.name,
        });
    }

    let updated =
        sqlx::query("UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND product_id = $2")
            .bind(cart.id)
            .bind(product_id)
            .bind(new_quantity)
            .execute(&mut *tx)
            .await?;
    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    tx.commit().await?;

    let view = load_cart_view(pool, user.user_id).await?;
    Ok(ApiResponse::success("Quantity updated", view, None))
}

/// Idempotent: removing an absent line is not an error.
pub async fn remove_from_cart(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    sqlx::query(
        r#"
        DELETE FROM cart_items ci
        USING carts c
        WHERE ci.cart_id = c.id
          AND c.user_id = $1
          AND c.status = 'active'
          AND ci.product_id = $2
        "#,
    )
    .bind(user.user_id)
    .bind(product_id)
    .execute(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn get_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let view = load_cart_view(pool, user.user_id).await?;
    Ok(ApiResponse::success("Cart", view, None))
}

#[derive(FromRow)]
struct CartLineRow {
    product_id: Uuid,
    name: String,
    price: Decimal,
    quantity: i32,
}

async fn load_cart_view(pool: &DbPool, user_id: Uuid) -> AppResult<CartView> {
    let cart: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM carts WHERE user_id = $1 AND status = 'active'")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let Some((cart_id,)) = cart else {
        return Ok(CartView {
            cart_id: None,
            items: Vec::new(),
            total: Decimal::ZERO,
        });
    };

    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.product_id, p.name, p.price, ci.quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let mut total = Decimal::ZERO;
    let items = rows
        .into_iter()
        .map(|row| {
            let subtotal = line_subtotal(row.price, row.quantity);
            total += subtotal;
            CartLine {
                product_id: row.product_id,
                name: row.name,
                price: row.price,
                quantity: row.quantity,
                subtotal,
            }
        })
        .collect();

    Ok(CartView {
        cart_id: Some(cart_id),
        items,
        total: round_money(total),
    })
}
