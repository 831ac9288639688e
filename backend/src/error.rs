use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Customer {0} not found")]
    CustomerNotFound(i64),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Order {order_id} has no item for product {product_id}")]
    ItemNotFound { order_id: i64, product_id: i64 },

    #[error("{0}")]
    BadRequest(String),

    /// Request body or path that could not be extracted; keeps the status
    /// axum picked for the rejection (422 for bad JSON data, 400 for bad paths).
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::OrderNotFound(_)
            | AppError::ProductNotFound(_)
            | AppError::CustomerNotFound(_)
            | AppError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Rejected { status, .. } => *status,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Driver errors stay in the log; clients get a generic message.
        let detail = match &self {
            AppError::Database(source) => {
                error!(error = %source, "Database error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(AppError::OrderNotFound(1).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ProductNotFound(1).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::CustomerNotFound(1).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn insufficient_stock_message_names_both_quantities() {
        let err = AppError::InsufficientStock {
            product_id: 1,
            requested: Decimal::new(150, 1),
            available: Decimal::new(100, 1),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 1: requested 15.0, available 10.0"
        );
    }

    #[test]
    fn missing_item_is_not_found() {
        let err = AppError::ItemNotFound {
            order_id: 1,
            product_id: 2,
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Order 1 has no item for product 2");
    }

    #[test]
    fn database_errors_are_internal() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
