use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{KvError, KvResult, KvStore};

/// Minimum spacing between full sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum Stored {
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process [`KvStore`] with Redis-like semantics.
///
/// Expired keys are dropped on access, and writes sweep the whole map at
/// most once per [`SWEEP_INTERVAL`] so keys nobody reads again are still
/// reclaimed. Uses the tokio clock so tests can advance time with a paused
/// runtime. Sessions do not survive a restart.
#[derive(Clone)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    next_sweep: Arc<Mutex<Instant>>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
            next_sweep: Arc::new(Mutex::new(Instant::now() + SWEEP_INTERVAL)),
        }
    }
}

impl fmt::Debug for MemoryKvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKvStore")
            .field("keys", &self.entries.lock().len())
            .finish()
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently held, including expired ones not yet swept.
    pub fn stored_keys(&self) -> usize {
        self.entries.lock().len()
    }

    /// Remaining lifetime of a live key, `None` when absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn with_live<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut Entry>) -> R,
    ) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        f(entries.get_mut(key))
    }

    fn sweep_if_due(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let mut next_sweep = self.next_sweep.lock();
        if now < *next_sweep {
            return;
        }
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        *next_sweep = now + SWEEP_INTERVAL;

        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, remaining = entries.len(), "swept expired keys");
        }
    }
}

/// Expiry deadline for `ttl` from `now`. A TTL too large to represent
/// never expires.
fn deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    now.checked_add(ttl)
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> KvResult<()> {
        let now = Instant::now();
        let entry = Entry {
            value: Stored::Text(value.to_string()),
            expires_at: deadline(now, ttl),
        };
        let mut entries = self.entries.lock();
        self.sweep_if_due(&mut entries, now);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Stored::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(KvError::WrongType {
                command: "GET",
                key: key.to_string(),
            }),
        })
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        let live = self.with_live(key, |entry| entry.is_some());
        self.entries.lock().remove(key);
        Ok(live)
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        Ok(self.with_live(key, |entry| entry.is_some()))
    }

    async fn sadd(&self, key: &str, member: &str) -> KvResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        self.sweep_if_due(&mut entries, now);
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Stored::Set(BTreeSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Stored::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            Stored::Text(_) => Err(KvError::WrongType {
                command: "SADD",
                key: key.to_string(),
            }),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> KvResult<()> {
        let emptied = self.with_live(key, |entry| match entry {
            None => Ok(false),
            Some(Entry {
                value: Stored::Set(members),
                ..
            }) => {
                members.remove(member);
                Ok(members.is_empty())
            }
            Some(_) => Err(KvError::WrongType {
                command: "SREM",
                key: key.to_string(),
            }),
        })?;

        // Redis drops a set once its last member is removed.
        if emptied {
            self.entries.lock().remove(key);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> KvResult<Vec<String>> {
        self.with_live(key, |entry| match entry {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Stored::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(KvError::WrongType {
                command: "SMEMBERS",
                key: key.to_string(),
            }),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        Ok(self.with_live(key, |entry| match entry {
            None => false,
            Some(entry) => {
                entry.expires_at = deadline(Instant::now(), ttl);
                true
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_ex_expires_after_ttl() {
        let store = MemoryKvStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn sets_follow_redis_semantics() {
        let store = MemoryKvStore::new();
        store.sadd("s", "a").await.unwrap();
        store.sadd("s", "b").await.unwrap();
        store.sadd("s", "a").await.unwrap();
        assert_eq!(store.smembers("s").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.ttl("s"), None);

        assert!(store.expire("s", Duration::from_secs(5)).await.unwrap());
        assert!(store.ttl("s").is_some());

        store.srem("s", "a").await.unwrap();
        store.srem("s", "b").await.unwrap();
        assert!(!store.exists("s").await.unwrap());
        assert!(store.smembers("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_type_is_an_error() {
        let store = MemoryKvStore::new();
        store.sadd("s", "a").await.unwrap();
        store
            .set_ex("t", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            store.get("s").await,
            Err(KvError::WrongType { command: "GET", .. })
        ));
        assert!(matches!(
            store.sadd("t", "x").await,
            Err(KvError::WrongType { command: "SADD", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_reclaim_keys_nobody_reads_again() {
        let store = MemoryKvStore::new();
        for user in 0..1000 {
            let token = format!("token-{user}");
            store
                .set_ex(&token, &user.to_string(), Duration::from_secs(10))
                .await
                .unwrap();
            let index = format!("index:{user}");
            store.sadd(&index, &token).await.unwrap();
            store.expire(&index, Duration::from_secs(10)).await.unwrap();
        }
        assert_eq!(store.stored_keys(), 2000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store
            .set_ex("fresh", "1", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(store.stored_keys(), 1);
        assert_eq!(store.get("fresh").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_are_throttled() {
        let store = MemoryKvStore::new();
        tokio::time::advance(SWEEP_INTERVAL).await;
        store.set_ex("a", "1", Duration::from_secs(1)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        store.set_ex("b", "1", Duration::from_secs(1)).await.unwrap();
        // `a` is dead but the last sweep was too recent to run again.
        assert_eq!(store.stored_keys(), 2);
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.stored_keys(), 1);
    }

    #[tokio::test]
    async fn unrepresentable_ttls_never_expire() {
        let store = MemoryKvStore::new();
        store.set_ex("k", "v", Duration::MAX).await.unwrap();
        assert!(store.expire("k", Duration::MAX).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.ttl("k"), None);
    }

    #[tokio::test]
    async fn expire_and_del_on_missing_keys() {
        let store = MemoryKvStore::new();
        assert!(!store.expire("nope", Duration::from_secs(1)).await.unwrap());
        assert!(!store.del("nope").await.unwrap());

        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.del("k").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
    }
}
