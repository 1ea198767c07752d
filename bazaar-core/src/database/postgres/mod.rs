mod advertisements;
mod users;

use std::time::Duration;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::{BazaarError, Result};

pub use advertisements::PostgresAdvertisementRepository;
pub use users::PostgresUserRepository;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open a pool and bring the schema up to date.
pub async fn connect_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
        .map_err(|e| {
            BazaarError::internal(format!("Database connection failed: {e}"))
        })?;

    MIGRATOR.run(&pool).await.map_err(|e| {
        BazaarError::internal(format!("Migration failed: {e}"))
    })?;

    info!(max_connections, "Database pool initialized");
    Ok(pool)
}
