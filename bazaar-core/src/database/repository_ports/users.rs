use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{PasswordDigest, UserId};
use crate::context::RequestContext;
use crate::error::Result;

/// Stored account, including its credential material.
#[derive(Clone)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            login: self.login.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub digest: PasswordDigest,
}

#[async_trait]
pub trait UserRepository: Send + Sync + fmt::Debug {
    /// Fails with `AlreadyExists` when the login is taken.
    async fn create(&self, ctx: &RequestContext, user: NewUser) -> Result<User>;

    async fn find_by_id(&self, ctx: &RequestContext, id: UserId) -> Result<User>;

    async fn find_by_login(
        &self,
        ctx: &RequestContext,
        login: &str,
    ) -> Result<User>;
}
