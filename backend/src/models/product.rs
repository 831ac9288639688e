use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::check_scale;
use crate::error::{AppError, AppResult};

pub const DEFAULT_UNIT: &str = "pcs";

/// Stocked product. `quantity` is the stock still available for reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Unit label shown next to quantities (e.g. "pcs", "kg")
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn has_stock_for(&self, requested: Decimal) -> bool {
        self.quantity >= requested
    }
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub unit: Option<String>,
}

impl CreateProduct {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name must not be empty".to_string()));
        }
        if self.quantity < Decimal::ZERO {
            return Err(AppError::BadRequest("quantity must be >= 0".to_string()));
        }
        if self.price < Decimal::ZERO {
            return Err(AppError::BadRequest("price must be >= 0".to_string()));
        }
        check_scale("quantity", self.quantity)?;
        check_scale("price", self.price)?;
        Ok(())
    }

    pub fn unit_or_default(&self) -> &str {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|unit| !unit.is_empty())
            .unwrap_or(DEFAULT_UNIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(quantity: Decimal, price: Decimal) -> CreateProduct {
        CreateProduct {
            name: "Laptop".to_string(),
            quantity,
            price,
            unit: None,
        }
    }

    #[test]
    fn stock_check_is_inclusive() {
        let now = Utc::now();
        let product = Product {
            id: 1,
            name: "Laptop".to_string(),
            quantity: Decimal::from(10),
            price: Decimal::from(50_000),
            unit: DEFAULT_UNIT.to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(product.has_stock_for(Decimal::from(10)));
        assert!(!product.has_stock_for(Decimal::new(101, 1)));
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let result = payload(Decimal::from(-1), Decimal::ONE).validate();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn negative_price_is_rejected() {
        let result = payload(Decimal::ONE, Decimal::new(-1, 2)).validate();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn overly_precise_price_is_rejected() {
        let result = payload(Decimal::ONE, Decimal::new(1, 7)).validate();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn zero_stock_product_is_valid() {
        assert!(payload(Decimal::ZERO, Decimal::ZERO).validate().is_ok());
    }

    #[test]
    fn blank_unit_falls_back_to_default() {
        let mut p = payload(Decimal::ONE, Decimal::ONE);
        p.unit = Some("  ".to_string());
        assert_eq!(p.unit_or_default(), DEFAULT_UNIT);
        p.unit = Some("kg".to_string());
        assert_eq!(p.unit_or_default(), "kg");
    }

    #[test]
    fn quantities_serialize_as_json_numbers() {
        let now = Utc::now();
        let product = Product {
            id: 7,
            name: "Mouse".to_string(),
            quantity: Decimal::new(85, 1),
            price: Decimal::from(1000),
            unit: DEFAULT_UNIT.to_string(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["quantity"].as_f64(), Some(8.5));
        assert_eq!(value["price"].as_f64(), Some(1000.0));
    }

    #[test]
    fn float_payload_parses_to_exact_decimal() {
        let p: CreateProduct =
            serde_json::from_str(r#"{"name":"Mouse","quantity":0.1,"price":19.99}"#).unwrap();
        assert_eq!(p.quantity, Decimal::new(1, 1));
        assert_eq!(p.price, Decimal::new(1999, 2));
    }
}
