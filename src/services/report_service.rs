use rust_decimal::Decimal;

use crate::{
    db::DbPool,
    dto::reports::{InventoryReportRow, SalesReport, SalesReportRow, UserActivityRow},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    money::round_money,
    response::{ApiResponse, Meta},
    routes::params::{InventoryReportKind, InventoryReportQuery, SalesReportQuery,
        UserActivityQuery},
};

/// Report queries return typed rows only; rendering, charting and file
/// exports are presentation concerns outside this service.
pub async fn sales_report(
    pool: &DbPool,
    user: &AuthUser,
    query: SalesReportQuery,
) -> AppResult<ApiResponse<SalesReport>> {
    ensure_admin(user)?;

    let rows = sqlx::query_as::<_, SalesReportRow>(
        r#"
        SELECT o.id AS order_id, o.order_date, o.total_amount, o.status,
               u.username, u.first_name, u.last_name
        FROM orders o
        JOIN users u ON u.id = o.user_id
        WHERE ($1::date IS NULL OR o.order_date::date >= $1)
          AND ($2::date IS NULL OR o.order_date::date <= $2)
        ORDER BY o.order_date DESC
        "#,
    )
    .bind(query.from)
    .bind(query.to)
    .fetch_all(pool)
    .await?;

    let orders_count = rows.len() as i64;
    let revenue = round_money(rows.iter().map(|r| r.total_amount).sum::<Decimal>());

    Ok(ApiResponse::success(
        "Sales report",
        SalesReport {
            rows,
            orders_count,
            revenue,
        },
        Some(Meta::empty()),
    ))
}

pub async fn inventory_report(
    pool: &DbPool,
    user: &AuthUser,
    query: InventoryReportQuery,
) -> AppResult<ApiResponse<Vec<InventoryReportRow>>> {
    ensure_admin(user)?;

    let kind = query.kind.unwrap_or(InventoryReportKind::All);
    let sort_by = query.sort_by.map(|s| s.as_sql()).unwrap_or("name");

    // Both fragments come from closed enums, never from user input.
    let sql = format!(
        r#"
        SELECT id AS product_id, name, price, stock, (image IS NOT NULL) AS has_image
        FROM products
        {}
        ORDER BY {sort_by}
        "#,
        kind.as_filter_sql()
    );

    let rows = sqlx::query_as::<_, InventoryReportRow>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(ApiResponse::success(
        "Inventory report",
        rows,
        Some(Meta::empty()),
    ))
}

pub async fn user_activity_report(
    pool: &DbPool,
    user: &AuthUser,
    query: UserActivityQuery,
) -> AppResult<ApiResponse<Vec<UserActivityRow>>> {
    ensure_admin(user)?;

    let rows = sqlx::query_as::<_, UserActivityRow>(
        r#"
        SELECT u.id AS user_id, u.username, u.first_name, u.last_name,
               COUNT(o.id) AS orders_count,
               COALESCE(SUM(o.total_amount), 0) AS total_spent
        FROM users u
        LEFT JOIN orders o
          ON o.user_id = u.id
         AND ($1::date IS NULL OR o.order_date::date >= $1)
        GROUP BY u.id, u.username, u.first_name, u.last_name
        ORDER BY orders_count DESC, u.username
        "#,
    )
    .bind(query.since)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "User activity",
        rows,
        Some(Meta::empty()),
    ))
}
