use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::check_scale;
use crate::error::{AppError, AppResult};
use crate::models::Product;

pub const DEFAULT_STATUS: &str = "new";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    /// Human-facing order code, unique across orders.
    pub order_number: String,
    pub customer_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single (order, product) line. At most one exists per pair; repeated adds
/// accumulate into `quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub order_id: i64,
    pub product_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order joined with its lines for the detail endpoint.
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemAction {
    Created,
    Updated,
}

/// Result of a committed `add_item`. `product.quantity` is the stock left
/// after the reservation.
#[derive(Debug, Clone)]
pub struct AddItemOutcome {
    pub action: ItemAction,
    pub item: OrderItem,
    pub product: Product,
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub order_number: String,
    pub customer_id: i64,
    pub status: Option<String>,
}

impl CreateOrder {
    pub fn validate(&self) -> AppResult<()> {
        if self.order_number.trim().is_empty() {
            return Err(AppError::BadRequest(
                "order_number must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn status_or_default(&self) -> &str {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
            .unwrap_or(DEFAULT_STATUS)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddOrderItem {
    pub product_id: i64,
    pub quantity: Decimal,
}

impl AddOrderItem {
    pub fn validate(&self) -> AppResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(AppError::BadRequest("quantity must be > 0".to_string()));
        }
        check_scale("quantity", self.quantity)
    }
}
