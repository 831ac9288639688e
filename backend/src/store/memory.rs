use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTx};
use crate::error::{AppError, AppResult};
use crate::models::*;

#[derive(Debug, Default, Clone)]
struct Tables {
    customers: BTreeMap<i64, Customer>,
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    items: BTreeMap<(i64, i64), OrderItem>,
}

fn next_id<V>(table: &BTreeMap<i64, V>) -> i64 {
    table.keys().next_back().map_or(1, |id| id + 1)
}

/// In-process store. A transaction holds the store-wide lock until it is
/// committed or dropped, so transactions never interleave.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = Tables::clone(&guard);
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

/// Writes land in `staged`; commit copies it over the locked tables.
struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_customer(&mut self, payload: &CreateCustomer) -> AppResult<Customer> {
        let customer = Customer {
            id: next_id(&self.staged.customers),
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_string(),
            created_at: Utc::now(),
        };
        self.staged.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn fetch_customer(&mut self, id: i64) -> AppResult<Option<Customer>> {
        Ok(self.staged.customers.get(&id).cloned())
    }

    async fn insert_product(&mut self, payload: &CreateProduct) -> AppResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: next_id(&self.staged.products),
            name: payload.name.trim().to_string(),
            quantity: payload.quantity,
            price: payload.price,
            unit: payload.unit_or_default().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.staged.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn fetch_product(&mut self, id: i64) -> AppResult<Option<Product>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn fetch_product_for_update(&mut self, id: i64) -> AppResult<Option<Product>> {
        self.fetch_product(id).await
    }

    async fn update_product_quantity(&mut self, id: i64, quantity: Decimal) -> AppResult<Product> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .ok_or(AppError::ProductNotFound(id))?;
        product.quantity = quantity;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn insert_order(&mut self, payload: &CreateOrder) -> AppResult<Order> {
        let order_number = payload.order_number.trim();
        if self
            .staged
            .orders
            .values()
            .any(|order| order.order_number == order_number)
        {
            return Err(AppError::Conflict(format!(
                "Order number {order_number} already exists"
            )));
        }
        if !self.staged.customers.contains_key(&payload.customer_id) {
            return Err(AppError::CustomerNotFound(payload.customer_id));
        }

        let now = Utc::now();
        let order = Order {
            id: next_id(&self.staged.orders),
            order_number: order_number.to_string(),
            customer_id: payload.customer_id,
            status: payload.status_or_default().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.staged.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn fetch_order_for_update(&mut self, id: i64) -> AppResult<Option<Order>> {
        self.fetch_order(id).await
    }

    async fn fetch_order_items(&mut self, order_id: i64) -> AppResult<Vec<OrderItem>> {
        Ok(self
            .staged
            .items
            .range((order_id, i64::MIN)..=(order_id, i64::MAX))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn fetch_item_for_update(
        &mut self,
        order_id: i64,
        product_id: i64,
    ) -> AppResult<Option<OrderItem>> {
        Ok(self.staged.items.get(&(order_id, product_id)).cloned())
    }

    async fn insert_item(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: Decimal,
    ) -> AppResult<OrderItem> {
        if self.staged.items.contains_key(&(order_id, product_id)) {
            return Err(AppError::Conflict(format!(
                "Order {order_id} already has a line for product {product_id}"
            )));
        }

        let now = Utc::now();
        let item = OrderItem {
            order_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        self.staged.items.insert((order_id, product_id), item.clone());
        Ok(item)
    }

    async fn update_item_quantity(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: Decimal,
    ) -> AppResult<OrderItem> {
        let item = self
            .staged
            .items
            .get_mut(&(order_id, product_id))
            .ok_or(AppError::ItemNotFound {
                order_id,
                product_id,
            })?;
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn customer() -> CreateCustomer {
        CreateCustomer {
            name: "Test Customer".to_string(),
            email: "test@example.com".to_string(),
        }
    }

    fn laptop() -> CreateProduct {
        CreateProduct {
            name: "Laptop".to_string(),
            quantity: Decimal::from(10),
            price: Decimal::from(50_000),
            unit: None,
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_later_transactions() -> TestResult {
        let store = MemoryStore::new();

        let mut tx = store.begin().await?;
        let product = tx.insert_product(&laptop()).await?;
        tx.commit().await?;

        let mut tx = store.begin().await?;
        assert_eq!(tx.fetch_product(product.id).await?, Some(product));

        Ok(())
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() -> TestResult {
        let store = MemoryStore::new();

        let mut tx = store.begin().await?;
        let product = tx.insert_product(&laptop()).await?;
        tx.update_product_quantity(product.id, Decimal::ZERO).await?;
        drop(tx);

        let mut tx = store.begin().await?;
        assert!(tx.fetch_product(product.id).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially_per_table() -> TestResult {
        let store = MemoryStore::new();
        let mut tx = store.begin().await?;

        let first = tx.insert_product(&laptop()).await?;
        let second = tx.insert_product(&laptop()).await?;
        let customer = tx.insert_customer(&customer()).await?;

        assert_eq!((first.id, second.id, customer.id), (1, 2, 1));

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_order_number_conflicts() -> TestResult {
        let store = MemoryStore::new();
        let mut tx = store.begin().await?;
        let customer = tx.insert_customer(&customer()).await?;
        let payload = CreateOrder {
            order_number: "TEST-001".to_string(),
            customer_id: customer.id,
            status: None,
        };

        tx.insert_order(&payload).await?;
        let result = tx.insert_order(&payload).await;

        assert!(
            matches!(result, Err(AppError::Conflict(_))),
            "expected Conflict, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn updating_a_missing_line_is_item_not_found() -> TestResult {
        let store = MemoryStore::new();
        let mut tx = store.begin().await?;

        let result = tx.update_item_quantity(1, 2, Decimal::ONE).await;

        assert!(
            matches!(
                result,
                Err(AppError::ItemNotFound {
                    order_id: 1,
                    product_id: 2
                })
            ),
            "expected ItemNotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn order_items_are_scoped_to_their_order() -> TestResult {
        let store = MemoryStore::new();
        let mut tx = store.begin().await?;

        tx.insert_item(1, 2, Decimal::ONE).await?;
        tx.insert_item(1, 1, Decimal::ONE).await?;
        tx.insert_item(2, 1, Decimal::ONE).await?;

        let items = tx.fetch_order_items(1).await?;
        let products: Vec<i64> = items.iter().map(|item| item.product_id).collect();
        assert_eq!(products, vec![1, 2]);

        Ok(())
    }
}
