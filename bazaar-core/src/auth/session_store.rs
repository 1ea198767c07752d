//! Opaque session tokens over a TTL key-value store.
//!
//! Layout in the store:
//! - `<token>` → decimal user id, expiring after the configured TTL.
//! - `user_sessions:<user id>` → set of that user's tokens, with its own
//!   expiry kept at least as long as any member's.
//!
//! The per-user set is a best-effort secondary index. Writes to the two keys
//! are separate commands, so a failure between them can leave a token
//! without an index entry or an index entry pointing at nothing. Validity is
//! decided by the primary token key alone; the index is only consulted for
//! bulk revocation and enumeration, both of which tolerate dangling members.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::token::{generate_token, is_well_formed};
use crate::context::RequestContext;
use crate::error::{BazaarError, Result};
use crate::kv::KvStore;

pub const USER_SESSIONS_PREFIX: &str = "user_sessions:";

/// Collision retries before `create_session` gives up. With 256-bit tokens
/// a second attempt already points at a broken random source or store.
pub const MAX_TOKEN_ATTEMPTS: usize = 5;

pub type UserId = i64;

type TokenGenerator = Arc<dyn Fn() -> Result<String> + Send + Sync>;

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
    generate: TokenGenerator,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("kv", &self.kv)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

pub fn user_sessions_key(user_id: UserId) -> String {
    format!("{USER_SESSIONS_PREFIX}{user_id}")
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self {
            kv,
            ttl,
            generate: Arc::new(generate_token),
        }
    }

    #[cfg(test)]
    fn with_token_generator(mut self, generate: TokenGenerator) -> Self {
        self.generate = generate;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new session for `user_id` and register it in the user's
    /// reverse index.
    #[instrument(
        name = "session.create",
        skip(self, ctx),
        fields(request_id = %ctx.request_id()),
        err(Display)
    )]
    pub async fn create_session(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<String> {
        let token = self.unused_token().await?;

        self.kv
            .set_ex(&token, &user_id.to_string(), self.ttl)
            .await?;

        let index_key = user_sessions_key(user_id);
        self.kv.sadd(&index_key, &token).await?;
        self.kv.expire(&index_key, self.ttl).await?;

        debug!("session issued");
        Ok(token)
    }

    async fn unused_token(&self) -> Result<String> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let candidate = (self.generate)()?;
            if !self.kv.exists(&candidate).await? {
                return Ok(candidate);
            }
            warn!(attempt, "session token collision, regenerating");
        }

        Err(BazaarError::internal(format!(
            "no unused session token after {MAX_TOKEN_ATTEMPTS} attempts"
        )))
    }

    /// Resolve a live token to its owner.
    #[instrument(
        name = "session.get",
        skip(self, ctx, token),
        fields(request_id = %ctx.request_id())
    )]
    pub async fn get_session(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<UserId> {
        if !is_well_formed(token) {
            return Err(BazaarError::not_found("session not found"));
        }

        let owner = self
            .kv
            .get(token)
            .await?
            .ok_or_else(|| BazaarError::not_found("session not found"))?;

        parse_user_id(&owner)
    }

    /// Slide a live session's expiry forward to the full TTL.
    ///
    /// The owner's index is re-registered and its expiry extended in the
    /// same call, so the index never expires before a member it lists.
    #[instrument(
        name = "session.refresh",
        skip(self, ctx, token),
        fields(request_id = %ctx.request_id()),
        err(Display)
    )]
    pub async fn refresh_session(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<UserId> {
        let user_id = self.get_session(ctx, token).await?;

        if !self.kv.expire(token, self.ttl).await? {
            // Expired between the read and the extension.
            return Err(BazaarError::not_found("session not found"));
        }

        let index_key = user_sessions_key(user_id);
        self.kv.sadd(&index_key, token).await?;
        self.kv.expire(&index_key, self.ttl).await?;

        Ok(user_id)
    }

    /// Revoke a single session. Unknown tokens count as already logged out.
    #[instrument(
        name = "session.delete",
        skip(self, ctx, token),
        fields(request_id = %ctx.request_id()),
        err(Display)
    )]
    pub async fn delete_session(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<()> {
        if !is_well_formed(token) {
            return Ok(());
        }

        let Some(owner) = self.kv.get(token).await? else {
            debug!("session already gone");
            return Ok(());
        };

        self.kv.del(token).await?;

        let user_id = parse_user_id(&owner)?;
        self.kv.srem(&user_sessions_key(user_id), token).await?;
        Ok(())
    }

    /// Revoke every session listed in the user's index, then drop the index.
    ///
    /// Members that no longer resolve are treated as already revoked. A
    /// store failure part way through leaves the remaining sessions live and
    /// is reported as `Internal`.
    #[instrument(
        name = "session.delete_all",
        skip(self, ctx),
        fields(request_id = %ctx.request_id()),
        err(Display)
    )]
    pub async fn delete_all_sessions(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<()> {
        let index_key = user_sessions_key(user_id);
        let members = self.kv.smembers(&index_key).await?;

        let mut revoked = 0usize;
        for token in &members {
            if !is_well_formed(token) {
                warn!("skipping malformed entry in session index");
                continue;
            }
            if self.kv.del(token).await? {
                revoked += 1;
            }
        }

        self.kv.del(&index_key).await?;
        debug!(revoked, listed = members.len(), "sessions revoked");
        Ok(())
    }

    /// List the user's live tokens, pruning index entries whose session has
    /// already expired or been deleted.
    #[instrument(
        name = "session.list",
        skip(self, ctx),
        fields(request_id = %ctx.request_id()),
        err(Display)
    )]
    pub async fn active_sessions(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<String>> {
        let index_key = user_sessions_key(user_id);
        let members = self.kv.smembers(&index_key).await?;

        let mut live = Vec::with_capacity(members.len());
        for token in members {
            if is_well_formed(&token) && self.kv.exists(&token).await? {
                live.push(token);
            } else {
                debug!("pruning stale session index entry");
                self.kv.srem(&index_key, &token).await?;
            }
        }
        Ok(live)
    }
}

fn parse_user_id(raw: &str) -> Result<UserId> {
    raw.parse::<UserId>().map_err(|err| {
        BazaarError::internal(format!("corrupt session value {raw:?}: {err}"))
    })
}
