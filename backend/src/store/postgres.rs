use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::info;

use super::{Store, StoreTx};
use crate::error::{AppError, AppResult};
use crate::models::*;

const UNIQUE_VIOLATION: &str = "23505";

const CUSTOMER_COLUMNS: &str = "id, name, email, created_at";
const PRODUCT_COLUMNS: &str = "id, name, quantity, price, unit, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, order_number, customer_id, status, created_at, updated_at";
const ITEM_COLUMNS: &str = "order_id, product_id, quantity, created_at, updated_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and bring the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("Database connection pool established.");

        info!("Running migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations complete.");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    // ── Customers ─────────────────────────────────────────────────────────────

    async fn insert_customer(&mut self, payload: &CreateCustomer) -> AppResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (name, email) VALUES ($1, $2) RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(payload.name.trim())
        .bind(payload.email.trim())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(customer)
    }

    async fn fetch_customer(&mut self, id: i64) -> AppResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(customer)
    }

    // ── Products ──────────────────────────────────────────────────────────────

    async fn insert_product(&mut self, payload: &CreateProduct) -> AppResult<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (name, quantity, price, unit)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(payload.name.trim())
        .bind(payload.quantity)
        .bind(payload.price)
        .bind(payload.unit_or_default())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn fetch_product(&mut self, id: i64) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn fetch_product_for_update(&mut self, id: i64) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn update_product_quantity(&mut self, id: i64, quantity: Decimal) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET quantity   = $1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(quantity)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::ProductNotFound(id))
    }

    // ── Orders ────────────────────────────────────────────────────────────────

    async fn insert_order(&mut self, payload: &CreateOrder) -> AppResult<Order> {
        let order_number = payload.order_number.trim();

        let inserted = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (order_number, customer_id, status)
            VALUES ($1, $2, $3)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_number)
        .bind(payload.customer_id)
        .bind(payload.status_or_default())
        .fetch_one(&mut *self.tx)
        .await;

        inserted.map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict(format!("Order number {order_number} already exists"))
            } else {
                AppError::Database(err)
            }
        })
    }

    async fn fetch_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(order)
    }

    async fn fetch_order_for_update(&mut self, id: i64) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(order)
    }

    // ── Order items ───────────────────────────────────────────────────────────

    async fn fetch_order_items(&mut self, order_id: i64) -> AppResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY product_id"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(items)
    }

    async fn fetch_item_for_update(
        &mut self,
        order_id: i64,
        product_id: i64,
    ) -> AppResult<Option<OrderItem>> {
        let item = sqlx::query_as::<_, OrderItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM order_items
            WHERE order_id = $1 AND product_id = $2
            FOR UPDATE
            "#
        ))
        .bind(order_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn insert_item(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: Decimal,
    ) -> AppResult<OrderItem> {
        let item = sqlx::query_as::<_, OrderItem>(&format!(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn update_item_quantity(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: Decimal,
    ) -> AppResult<OrderItem> {
        let item = sqlx::query_as::<_, OrderItem>(&format!(
            r#"
            UPDATE order_items
            SET quantity   = $1,
                updated_at = NOW()
            WHERE order_id = $2 AND product_id = $3
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(quantity)
        .bind(order_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        item.ok_or(AppError::ItemNotFound {
            order_id,
            product_id,
        })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::orders;

    // Run against a live database: `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`

    /// Fresh customer, order and product with `stock` units; returns
    /// `(order_id, product_id)`.
    async fn seed(store: &PgStore, stock: i64) -> TestResult<(i64, i64)> {
        let customer = orders::create_customer(
            store,
            &CreateCustomer {
                name: "Test Customer".to_string(),
                email: "test@example.com".to_string(),
            },
        )
        .await?;
        let product = orders::create_product(
            store,
            &CreateProduct {
                name: "Laptop".to_string(),
                quantity: Decimal::from(stock),
                price: Decimal::from(50_000),
                unit: None,
            },
        )
        .await?;
        let order = orders::create_order(
            store,
            &CreateOrder {
                order_number: format!("PG-{}-{}", customer.id, product.id),
                customer_id: customer.id,
                status: None,
            },
        )
        .await?;

        Ok((order.id, product.id))
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn add_item_round_trip_against_postgres() -> TestResult {
        let url = std::env::var("TEST_DATABASE_URL")?;
        let store = PgStore::connect(&url, 2).await?;
        let (order_id, product_id) = seed(&store, 10).await?;

        let request = AddOrderItem {
            product_id,
            quantity: Decimal::from(2),
        };
        let first = orders::add_item(&store, order_id, &request).await?;
        let second = orders::add_item(&store, order_id, &request).await?;

        assert_eq!(first.action, ItemAction::Created);
        assert_eq!(second.action, ItemAction::Updated);
        assert_eq!(second.item.quantity, Decimal::from(4));
        assert_eq!(second.product.quantity, Decimal::from(6));

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn row_locks_keep_concurrent_adds_from_overdrawing() -> TestResult {
        let url = std::env::var("TEST_DATABASE_URL")?;
        let store = PgStore::connect(&url, 4).await?;
        let (order_id, product_id) = seed(&store, 10).await?;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let request = AddOrderItem {
                        product_id,
                        quantity: Decimal::from(6),
                    };
                    orders::add_item(&store, order_id, &request).await
                })
            })
            .collect();

        let mut succeeded = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => succeeded += 1,
                Err(AppError::InsufficientStock { .. }) => short += 1,
                Err(other) => return Err(other.into()),
            }
        }

        assert_eq!((succeeded, short), (1, 1));
        assert_eq!(
            orders::get_product(&store, product_id).await?.quantity,
            Decimal::from(4)
        );
        let order = orders::get_order(&store, order_id).await?;
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items.first().map(|item| item.quantity), Some(Decimal::from(6)));

        Ok(())
    }
}
