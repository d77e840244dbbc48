use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::OrderStatus;

/// One order row in the sales report, joined with its customer.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct SalesReportRow {
    pub order_id: Uuid,
    pub order_date: DateTime<Utc>,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesReport {
    pub rows: Vec<SalesReportRow>,
    pub orders_count: i64,
    #[schema(value_type = f64)]
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct InventoryReportRow {
    pub product_id: Uuid,
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub stock: i32,
    pub has_image: bool,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct UserActivityRow {
    pub user_id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub orders_count: i64,
    #[schema(value_type = f64)]
    pub total_spent: Decimal,
}
