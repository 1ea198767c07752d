use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError, aio::ConnectionManager};
use tracing::{debug, info};

use super::{KvError, KvResult, KvStore, ttl_secs};

/// Redis-backed [`KvStore`] over a multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisKvStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisKvStore {
    pub async fn connect(redis_url: &str) -> KvResult<Self> {
        info!("Connecting to Redis session store");

        let client = redis::Client::open(redis_url)
            .map_err(|e| KvError::command("OPEN", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| KvError::command("CONNECT", e))?;

        info!("Successfully connected to Redis session store");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

/// Server error code for a command applied to the wrong kind of value.
const WRONGTYPE_CODE: &str = "WRONGTYPE";

fn is_wrong_type(code: Option<&str>) -> bool {
    code == Some(WRONGTYPE_CODE)
}

fn map_err(command: &'static str, key: &str, err: RedisError) -> KvError {
    if is_wrong_type(err.code()) {
        KvError::WrongType {
            command,
            key: key.to_string(),
        }
    } else {
        KvError::command(command, err)
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> KvResult<()> {
        debug!(ttl_secs = ttl_secs(ttl), "Redis SET EX");
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .map_err(|e| map_err("SET", key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> =
            conn.get(key).await.map_err(|e| map_err("GET", key, e))?;
        Ok(value)
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 =
            conn.del(key).await.map_err(|e| map_err("DEL", key, e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| map_err("EXISTS", key, e))?;
        Ok(exists)
    }

    async fn sadd(&self, key: &str, member: &str) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .sadd(key, member)
            .await
            .map_err(|e| map_err("SADD", key, e))?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .srem(key, member)
            .await
            .map_err(|e| map_err("SREM", key, e))?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> KvResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .smembers(key)
            .await
            .map_err(|e| map_err("SMEMBERS", key, e))?;
        Ok(members)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let secs = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);
        let applied: bool = conn
            .expire(key, secs)
            .await
            .map_err(|e| map_err("EXPIRE", key, e))?;
        Ok(applied)
    }
}
