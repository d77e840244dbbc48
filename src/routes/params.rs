use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::OrderStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

// Pagination fields are inlined rather than flattened: serde_urlencoded
// buffers flattened values as strings, which rejects numeric query params.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Case-insensitive name substring match.
    pub q: Option<String>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
}

impl UserQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub threshold: Option<i32>,
}

impl LowStockQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SalesReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InventoryReportKind {
    All,
    InStock,
    OutOfStock,
}

impl InventoryReportKind {
    pub fn as_filter_sql(&self) -> &'static str {
        match self {
            InventoryReportKind::All => "",
            InventoryReportKind::InStock => "WHERE stock > 0",
            InventoryReportKind::OutOfStock => "WHERE stock = 0",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InventorySortBy {
    Name,
    Price,
    Stock,
}

impl InventorySortBy {
    pub fn as_sql(&self) -> &'static str {
        match self {
            InventorySortBy::Name => "name",
            InventorySortBy::Price => "price",
            InventorySortBy::Stock => "stock",
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryReportQuery {
    pub kind: Option<InventoryReportKind>,
    pub sort_by: Option<InventorySortBy>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserActivityQuery {
    pub since: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination {
            page: None,
            per_page: None,
        };
        assert_eq!(p.normalize(), (1, 20, 0));

        let p = Pagination {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));
    }

    #[test]
    fn product_query_accepts_explicit_pagination_params() {
        let uri: axum::http::Uri = "/api/products?page=2&per_page=10&q=apple".parse().unwrap();
        let query = axum::extract::Query::<ProductQuery>::try_from_uri(&uri)
            .expect("numeric pagination params")
            .0;
        assert_eq!(query.pagination().normalize(), (2, 10, 10));
        assert_eq!(query.q.as_deref(), Some("apple"));
    }

    #[test]
    fn order_list_query_accepts_pagination_and_status() {
        let uri: axum::http::Uri = "/api/admin/orders?page=2&status=completed".parse().unwrap();
        let query = axum::extract::Query::<OrderListQuery>::try_from_uri(&uri)
            .expect("numeric pagination params")
            .0;
        assert_eq!(query.pagination().normalize(), (2, 20, 20));
        assert!(matches!(query.status, Some(OrderStatus::Completed)));
    }
}
