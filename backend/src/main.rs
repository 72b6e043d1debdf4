//! Agarbatti ERP ledger - operator binary
//!
//! Opens the configured ledger, reports what it holds and logs the current
//! stock alerts.

use std::{sync::Arc, time::Duration};

use agarbatti_ledger::catalog::{InMemoryCatalog, InMemoryFormulations};
use agarbatti_ledger::clock::SystemClock;
use agarbatti_ledger::config::{Config, StorageBackend};
use agarbatti_ledger::storage::{JsonFileBackend, LedgerBackend, MemoryBackend, PgBackend};
use agarbatti_ledger::{AppError, LedgerEngine};
use shared::{Item, ItemCategory, LedgerLog};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agarbatti_ledger=debug,sqlx=warn".into());
    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Agarbatti ERP ledger");
    tracing::info!("Environment: {}", config.environment);

    let backend = open_backend(&config).await?;

    // Items known to the ledger stand in for the catalog here
    let catalog = Arc::new(InMemoryCatalog::default());
    let engine = LedgerEngine::open(
        backend,
        Arc::new(SystemClock),
        catalog.clone(),
        Arc::new(InMemoryFormulations::new()),
        config.alerts.usage_window_days,
    )
    .await?;

    for name in engine.store.item_names() {
        catalog.add_item(Item::new(name, ItemCategory::RawMaterial));
    }

    for log in LedgerLog::ALL {
        tracing::info!("{}: {} movement(s)", log, engine.store.len(log));
    }
    tracing::info!("{} production batch(es)", engine.planner.batches().len());

    let alerts = engine.resolver.alerts(engine.store.item_names());
    if alerts.is_empty() {
        tracing::info!("No stock alerts");
    }
    for position in alerts {
        tracing::warn!(
            "{} {}: balance {} kg, {} day(s) of stock",
            position.level,
            position.item_name,
            position.balance,
            position.days_until_stockout
        );
    }

    Ok(())
}

async fn open_backend(config: &Config) -> anyhow::Result<Arc<dyn LedgerBackend>> {
    let backend: Arc<dyn LedgerBackend> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; nothing will be persisted");
            Arc::new(MemoryBackend::new())
        }
        StorageBackend::File => {
            tracing::info!("Using ledger file {}", config.storage.path);
            Arc::new(JsonFileBackend::new(&config.storage.path))
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .ok_or_else(|| AppError::Configuration("storage.database_url is required for postgres".into()))?;

            // Create database connection pool
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.storage.max_connections)
                .min_connections(config.storage.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.is_development() {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            Arc::new(PgBackend::new(db_pool))
        }
    };
    Ok(backend)
}
