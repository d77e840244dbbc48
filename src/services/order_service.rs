use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::orders::{OrderLine, OrderList, OrderWithItems},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    money::{line_subtotal, round_money},
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

#[derive(Debug, FromRow)]
struct CheckoutLine {
    product_id: Uuid,
    name: String,
    price: Decimal,
    stock: i32,
    quantity: i32,
}

/// Converts the caller's active cart into a completed order.
///
/// Everything happens inside one transaction with the product rows locked:
/// the total is recomputed from current catalog prices, stock is re-checked
/// per line against the quantities now in the cart, and either every
/// decrement plus the order insert commits or nothing does. Locking the rows
/// in name order keeps concurrent checkouts from deadlocking each other.
pub async fn checkout(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut tx = pool.begin().await?;

    let cart: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM carts WHERE user_id = $1 AND status = 'active' FOR UPDATE",
    )
    .bind(user.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((cart_id,)) = cart else {
        return Err(AppError::EmptyCart);
    };

    let lines = sqlx::query_as::<_, CheckoutLine>(
        r#"
        SELECT ci.product_id, p.name, p.price, p.stock, ci.quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY p.name
        FOR UPDATE OF p
        "#,
    )
    .bind(cart_id)
    .fetch_all(&mut *tx)
    .await?;

    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let mut total = Decimal::ZERO;
    for line in &lines {
        if line.quantity <= 0 {
            return Err(AppError::Validation("Cart has an invalid quantity".into()));
        }
        if line.stock < line.quantity {
            return Err(AppError::InsufficientStock {
                product: line.name.clone(),
            });
        }
        total += line_subtotal(line.price, line.quantity);
    }
    let total = round_money(total);

    for line in &lines {
        // Guarded decrement; under the row locks this cannot miss, but a
        // zero row count still aborts the transaction rather than oversell.
        let updated =
            sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(line.product_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Lost the stock race for {}",
                line.name
            )));
        }
    }

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (id, user_id, cart_id, total_amount, status)
        VALUES ($1, $2, $3, $4, 'completed')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(cart_id)
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

    // The cart becomes the order's immutable line-item record; the next add
    // to cart allocates a fresh one.
    sqlx::query("UPDATE carts SET status = 'completed' WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let items = lines
        .into_iter()
        .map(|line| OrderLine {
            product_id: line.product_id,
            name: line.name,
            subtotal: line_subtotal(line.price, line.quantity),
            price: line.price,
            quantity: line.quantity,
        })
        .collect();

    Ok(ApiResponse::success(
        "Checkout complete",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let items = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY order_date DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.user_id)
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

#[derive(FromRow)]
struct OrderLineRow {
    product_id: Uuid,
    name: String,
    price: Decimal,
    quantity: i32,
}

pub(crate) async fn load_order_lines(pool: &DbPool, cart_id: Uuid) -> AppResult<Vec<OrderLine>> {
    let rows = sqlx::query_as::<_, OrderLineRow>(
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

    Ok(rows
        .into_iter()
        .map(|row| OrderLine {
            product_id: row.product_id,
            subtotal: line_subtotal(row.price, row.quantity),
            name: row.name,
            price: row.price,
            quantity: row.quantity,
        })
        .collect())
}
