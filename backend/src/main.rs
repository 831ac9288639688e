use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

mod config;
mod error;
mod extract;
mod handlers;
mod models;
mod orders;
mod store;

use crate::config::Config;
use crate::store::{MemoryStore, PgStore, Store};

/// Shared application state. The store is injected here and handed to every
/// operation explicitly.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,order_service=debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.max_connections).await?),
        None => {
            warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let app = build_router(AppState { store });

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Service ─────────────────────────────────────────────────────────
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))

        // ── Customers ───────────────────────────────────────────────────────
        .route("/api/v1/customers", post(handlers::customers::create_customer))

        // ── Products ────────────────────────────────────────────────────────
        .route("/api/v1/products", post(handlers::products::create_product))
        .route("/api/v1/products/:id", get(handlers::products::get_product))

        // ── Orders ──────────────────────────────────────────────────────────
        .route("/api/v1/orders", post(handlers::orders::create_order))
        .route("/api/v1/orders/:order_id", get(handlers::orders::get_order))
        .route(
            "/api/v1/orders/:order_id/items",
            post(handlers::orders::add_item),
        )

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
