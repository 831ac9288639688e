//! Persistence seam.
//!
//! Every operation runs inside a [`StoreTx`]. Reads ending in `_for_update`
//! lock the row until the transaction ends. Dropping a transaction without
//! calling [`StoreTx::commit`] discards its writes.

mod memory;
mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::AppResult;
use crate::models::*;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
    // ── Customers ────────────────────────────────────────────────────────────
    async fn insert_customer(&mut self, payload: &CreateCustomer) -> AppResult<Customer>;
    async fn fetch_customer(&mut self, id: i64) -> AppResult<Option<Customer>>;

    // ── Products ─────────────────────────────────────────────────────────────
    async fn insert_product(&mut self, payload: &CreateProduct) -> AppResult<Product>;
    async fn fetch_product(&mut self, id: i64) -> AppResult<Option<Product>>;
    async fn fetch_product_for_update(&mut self, id: i64) -> AppResult<Option<Product>>;
    async fn update_product_quantity(&mut self, id: i64, quantity: Decimal) -> AppResult<Product>;

    // ── Orders ───────────────────────────────────────────────────────────────
    /// Fails with `Conflict` when the order number is already taken.
    async fn insert_order(&mut self, payload: &CreateOrder) -> AppResult<Order>;
    async fn fetch_order(&mut self, id: i64) -> AppResult<Option<Order>>;
    async fn fetch_order_for_update(&mut self, id: i64) -> AppResult<Option<Order>>;

    // ── Order items ──────────────────────────────────────────────────────────
    async fn fetch_order_items(&mut self, order_id: i64) -> AppResult<Vec<OrderItem>>;
    async fn fetch_item_for_update(
        &mut self,
        order_id: i64,
        product_id: i64,
    ) -> AppResult<Option<OrderItem>>;
    async fn insert_item(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: Decimal,
    ) -> AppResult<OrderItem>;
    async fn update_item_quantity(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: Decimal,
    ) -> AppResult<OrderItem>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
