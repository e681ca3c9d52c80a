//! E-commerce backend server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecommerce_backend::adapters::{LogPublisher, MemoryStore, NatsPublisher, PgStore, SandboxGateway};
use ecommerce_backend::config::{AppConfig, CartCleanupConfig};
use ecommerce_backend::http::{self, AppState, SERVICE_NAME};
use ecommerce_backend::ports::{EventPublisher, Repositories};
use ecommerce_backend::services::{CartService, Services};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = AppConfig::from_env()?;

    let repos = match cfg.database_url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, cfg.database_max_connections).await.context("connecting to database")?;
            store.migrate().await.context("running migrations")?;
            Repositories::from_store(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Repositories::from_store(MemoryStore::new())
        }
    };

    let events: Arc<dyn EventPublisher> = match cfg.nats_url.as_deref() {
        Some(url) => match NatsPublisher::connect(url).await {
            Ok(publisher) => Arc::new(publisher),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let services = Services::new(repos, Arc::new(SandboxGateway::new()), events, cfg.pricing.clone());
    spawn_cart_cleanup(services.carts.clone(), cfg.cart_cleanup);
    let app = http::router(AppState::new(services));

    let addr = cfg.socket_addr();
    tracing::info!("{SERVICE_NAME} listening on {addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

fn spawn_cart_cleanup(carts: CartService, cfg: CartCleanupConfig) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = carts.cleanup_stale_carts(cfg.stale_after_days).await {
                tracing::error!(error = %e, "stale cart cleanup failed");
            }
        }
    });
}
