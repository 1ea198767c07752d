//! Wiring of the stores and services behind [`AppState`].

use std::sync::Arc;

use anyhow::{Context, Result};
use bazaar_core::auth::{CredentialHasher, CsrfGuard, SessionStore};
use bazaar_core::database::{
    PostgresAdvertisementRepository, PostgresUserRepository, connect_pool,
};
use bazaar_core::kv::{KvStore, MemoryKvStore, RedisKvStore};
use bazaar_core::listing::{ImageAdmission, ReqwestImageFetcher};
use tracing::{info, warn};

use super::app_state::AppState;
use super::config::Config;

pub async fn build_state(config: &Config) -> Result<AppState> {
    let pool = connect_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to initialize PostgreSQL")?;
    info!("Database connected and migrated");

    let kv: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisKvStore::connect(url)
                .await
                .context("failed to connect to Redis")?,
        ),
        None => {
            warn!(
                "REDIS_URL not set; sessions are kept in memory and lost on restart"
            );
            Arc::new(MemoryKvStore::new())
        }
    };

    let fetcher = ReqwestImageFetcher::new()
        .context("failed to build image fetch client")?;
    let hasher =
        CredentialHasher::new().context("failed to configure password hashing")?;

    Ok(AppState {
        users: Arc::new(PostgresUserRepository::new(pool.clone())),
        advertisements: Arc::new(PostgresAdvertisementRepository::new(pool)),
        sessions: SessionStore::new(kv, config.session_ttl),
        csrf: CsrfGuard::new(config.session_ttl)
            .with_secure_cookies(config.cookie_secure),
        hasher: Arc::new(hasher),
        image_admission: ImageAdmission::new(
            Arc::new(fetcher),
            config.image_probe_timeout,
        ),
        cookie_secure: config.cookie_secure,
    })
}
