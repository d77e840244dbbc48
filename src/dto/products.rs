use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Product, ProductStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub stock: i32,
    #[serde(default)]
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductStatusRequest {
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    /// Signed stock delta; the resulting stock may never go below zero.
    pub delta: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
