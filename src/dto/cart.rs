use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// One cart line joined with its product, subtotal computed server-side.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub quantity: i32,
    #[schema(value_type = f64)]
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    /// Absent when the user has no active cart yet.
    pub cart_id: Option<Uuid>,
    pub items: Vec<CartLine>,
    #[schema(value_type = f64)]
    pub total: Decimal,
}
