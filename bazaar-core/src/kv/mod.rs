//! TTL key-value store abstraction consumed by the session store.
//!
//! The command set mirrors the subset of Redis the session layer needs:
//! `SET .. EX`, `GET`, `DEL`, `EXISTS`, `SADD`, `SREM`, `SMEMBERS` and
//! `EXPIRE`. Every command is atomic per key; nothing here offers
//! multi-key transactions.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::BazaarError;

mod memory;
#[cfg(feature = "database")]
mod redis_store;

pub use memory::MemoryKvStore;
#[cfg(feature = "database")]
pub use redis_store::RedisKvStore;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("{command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("{command} against a key holding the wrong kind of value: {key}")]
    WrongType { command: &'static str, key: String },
}

impl KvError {
    pub fn command(command: &'static str, message: impl fmt::Display) -> Self {
        Self::Command {
            command,
            message: message.to_string(),
        }
    }
}

impl From<KvError> for BazaarError {
    fn from(err: KvError) -> Self {
        BazaarError::internal(err.to_string())
    }
}

pub type KvResult<T> = std::result::Result<T, KvError>;

#[async_trait]
pub trait KvStore: Send + Sync + fmt::Debug {
    /// `SET key value EX ttl`; overwrites value and expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration)
    -> KvResult<()>;

    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Returns whether a key was removed.
    async fn del(&self, key: &str) -> KvResult<bool>;

    async fn exists(&self, key: &str) -> KvResult<bool>;

    async fn sadd(&self, key: &str, member: &str) -> KvResult<()>;

    async fn srem(&self, key: &str, member: &str) -> KvResult<()>;

    async fn smembers(&self, key: &str) -> KvResult<Vec<String>>;

    /// Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool>;
}

/// Redis expiries are whole seconds; never round a live key down to zero.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
