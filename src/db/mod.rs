//! Store backends for nucleus resolution
//!
//! SQLite for local runs and tests, PostgreSQL for the shared scraper database.

pub mod connection;
pub mod postgres;
pub mod sqlite;

pub use connection::{init_pool, redact_url, DbPool};
pub use postgres::PgStore;
pub use sqlite::SqliteStore;

use crate::config::StoreBackend;
use crate::error::Result;
use crate::store::NucleusStore;
use std::sync::Arc;
use tracing::info;

/// Connect to the configured backend and make sure its schema exists
pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn NucleusStore>> {
    match backend {
        StoreBackend::Postgres { url, max_connections } => {
            info!("Connecting to PostgreSQL at {}", redact_url(url));
            let pool = init_pool(url, *max_connections).await?;
            let store = PgStore::new(pool);
            store.init_schema().await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Sqlite { path } => Ok(Arc::new(SqliteStore::open(path)?)),
    }
}
