use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    error::AppResult,
    extract::{AppJson, AppPath},
    models::{AddOrderItem, CreateOrder, ItemAction},
    orders, AppState,
};

#[derive(Debug, Serialize)]
struct ItemView {
    order_id: i64,
    product_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    quantity: Decimal,
}

#[derive(Debug, Serialize)]
struct StockView {
    product_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    quantity: Decimal,
    unit: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateOrder>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let order = orders::create_order(state.store.as_ref(), &payload).await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "data": order }))))
}

pub async fn get_order(
    State(state): State<AppState>,
    AppPath(order_id): AppPath<i64>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let order = orders::get_order(state.store.as_ref(), order_id).await?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "data": order }))))
}

// ── Add item ──────────────────────────────────────────────────────────────────

pub async fn add_item(
    State(state): State<AppState>,
    AppPath(order_id): AppPath<i64>,
    AppJson(payload): AppJson<AddOrderItem>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let outcome = orders::add_item(state.store.as_ref(), order_id, &payload).await?;

    let message = match outcome.action {
        ItemAction::Created => "Product added to order",
        ItemAction::Updated => "Order item quantity updated",
    };

    let item = ItemView {
        order_id: outcome.item.order_id,
        product_id: outcome.item.product_id,
        quantity: outcome.item.quantity,
    };
    let remaining = StockView {
        product_id: outcome.product.id,
        quantity: outcome.product.quantity,
        unit: outcome.product.unit,
    };

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "action": outcome.action,
            "message": message,
            "item": item,
            "product_remaining": remaining,
        })),
    ))
}
