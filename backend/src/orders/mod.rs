//! Order operations. Each call opens one transaction on the store it is given
//! and commits only after every write succeeded.

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::Store;

/// Stock arithmetic for one add request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub action: ItemAction,
    /// Quantity the order line holds after the request.
    pub line_quantity: Decimal,
    /// Stock left on the product after the request.
    pub remaining: Decimal,
}

/// Only the incremental `requested` amount has to be in stock; what the line
/// already holds was reserved by earlier requests.
pub fn reserve(
    product: &Product,
    existing: Option<&OrderItem>,
    requested: Decimal,
) -> AppResult<Reservation> {
    if !product.has_stock_for(requested) {
        return Err(AppError::InsufficientStock {
            product_id: product.id,
            requested,
            available: product.quantity,
        });
    }

    let (action, line_quantity) = match existing {
        Some(item) => (ItemAction::Updated, item.quantity + requested),
        None => (ItemAction::Created, requested),
    };

    Ok(Reservation {
        action,
        line_quantity,
        remaining: product.quantity - requested,
    })
}

/// Add `request.quantity` of a product to an order, creating the line or
/// accumulating into the existing one, and take the same amount off stock.
pub async fn add_item(
    store: &dyn Store,
    order_id: i64,
    request: &AddOrderItem,
) -> AppResult<AddItemOutcome> {
    request.validate()?;

    let mut tx = store.begin().await?;

    // Lock order first, then product, so concurrent adds queue in one order.
    tx.fetch_order_for_update(order_id)
        .await?
        .ok_or(AppError::OrderNotFound(order_id))?;

    let product = tx
        .fetch_product_for_update(request.product_id)
        .await?
        .ok_or(AppError::ProductNotFound(request.product_id))?;

    let existing = tx
        .fetch_item_for_update(order_id, product.id)
        .await?;

    let reservation = reserve(&product, existing.as_ref(), request.quantity).map_err(|err| {
        warn!(
            order_id,
            product_id = product.id,
            requested = %request.quantity,
            available = %product.quantity,
            "Rejected order item: insufficient stock"
        );
        err
    })?;

    let item = match reservation.action {
        ItemAction::Updated => {
            tx.update_item_quantity(order_id, product.id, reservation.line_quantity)
                .await?
        }
        ItemAction::Created => {
            tx.insert_item(order_id, product.id, reservation.line_quantity)
                .await?
        }
    };

    let product = tx
        .update_product_quantity(product.id, reservation.remaining)
        .await?;

    tx.commit().await?;

    info!(
        order_id,
        product_id = product.id,
        action = ?reservation.action,
        line_quantity = %item.quantity,
        remaining = %product.quantity,
        "Added item to order"
    );

    Ok(AddItemOutcome {
        action: reservation.action,
        item,
        product,
    })
}

pub async fn create_customer(store: &dyn Store, payload: &CreateCustomer) -> AppResult<Customer> {
    payload.validate()?;

    let mut tx = store.begin().await?;
    let customer = tx.insert_customer(payload).await?;
    tx.commit().await?;

    info!(id = customer.id, email = %customer.email, "Created customer");
    Ok(customer)
}

pub async fn create_product(store: &dyn Store, payload: &CreateProduct) -> AppResult<Product> {
    payload.validate()?;

    let mut tx = store.begin().await?;
    let product = tx.insert_product(payload).await?;
    tx.commit().await?;

    info!(
        id = product.id,
        name = %product.name,
        quantity = %product.quantity,
        "Created product"
    );
    Ok(product)
}

pub async fn get_product(store: &dyn Store, id: i64) -> AppResult<Product> {
    let mut tx = store.begin().await?;
    let product = tx.fetch_product(id).await?;

    product.ok_or(AppError::ProductNotFound(id))
}

pub async fn create_order(store: &dyn Store, payload: &CreateOrder) -> AppResult<Order> {
    payload.validate()?;

    let mut tx = store.begin().await?;

    tx.fetch_customer(payload.customer_id)
        .await?
        .ok_or(AppError::CustomerNotFound(payload.customer_id))?;

    let order = tx.insert_order(payload).await?;
    tx.commit().await?;

    info!(
        id = order.id,
        order_number = %order.order_number,
        customer_id = order.customer_id,
        "Created order"
    );
    Ok(order)
}

pub async fn get_order(store: &dyn Store, id: i64) -> AppResult<OrderWithItems> {
    let mut tx = store.begin().await?;

    let order = tx
        .fetch_order(id)
        .await?
        .ok_or(AppError::OrderNotFound(id))?;
    let items = tx.fetch_order_items(id).await?;

    Ok(OrderWithItems { order, items })
}
