use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{OrderId, OrderItemId, OrderStatus, ProductId, ProductStatus, UserId};

/// Product resource as the backend serves it. Field names follow the wire
/// contract (`id_product`, `created_on`), not the client entity shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id_product: ProductId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: u32,
    pub status: ProductStatus,
    pub available: bool,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

/// Body for product create (POST) and full update (PUT). Images never travel
/// with this payload; they have their own endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPayload {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: u32,
    pub status: ProductStatus,
    pub available: bool,
}

/// Partial update carrying only the status field, used for every status
/// transition including logical delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPatch {
    pub status: ProductStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusPatch {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaidPatch {
    pub paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub message: String,
    pub new_images: Vec<String>,
    pub all_images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDeleteResponse {
    pub message: String,
    pub remaining_images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id_order: OrderId,
    pub user_name: String,
    pub total_price: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub id_user: Option<UserId>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "OrderItems", default)]
    pub order_items: Vec<OrderItemRecord>,
}

/// Line item as served inside an order. Price and name are optional on the
/// wire; the client backfills a per-unit price from the order total when the
/// backend omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id_order_item: OrderItemId,
    #[serde(default)]
    pub id_product: Option<ProductId>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatsRecord {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub completed_orders: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// The backend returns only the token; the client keeps the email it logged
/// in with alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
