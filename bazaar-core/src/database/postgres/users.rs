use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::auth::UserId;
use crate::context::RequestContext;
use crate::database::repository_ports::users::{NewUser, User, UserRepository};
use crate::error::{BazaarError, Result};

#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    login: String,
    first_name: String,
    last_name: String,
    password_hash: Vec<u8>,
    password_salt: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            login: row.login,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            password_salt: row.password_salt,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, login, first_name, last_name, password_hash, \
                            password_salt, created_at, updated_at";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(
        name = "db.users.create",
        skip(self, ctx, user),
        fields(request_id = %ctx.request_id())
    )]
    async fn create(&self, ctx: &RequestContext, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (login, first_name, last_name, password_hash, password_salt) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.login)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.digest.hash[..])
            .bind(&user.digest.salt[..])
            .fetch_one(&self.pool)
            .await
            .map_err(|err| match BazaarError::from(err) {
                BazaarError::AlreadyExists(_) => {
                    BazaarError::already_exists("login is already taken")
                }
                other => other,
            })?;

        Ok(row.into())
    }

    #[instrument(
        name = "db.users.find_by_id",
        skip(self, ctx),
        fields(request_id = %ctx.request_id())
    )]
    async fn find_by_id(&self, ctx: &RequestContext, id: UserId) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::from)
            .ok_or_else(|| BazaarError::not_found(format!("user {id} not found")))
    }

    #[instrument(
        name = "db.users.find_by_login",
        skip(self, ctx, login),
        fields(request_id = %ctx.request_id())
    )]
    async fn find_by_login(
        &self,
        ctx: &RequestContext,
        login: &str,
    ) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE login = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .map(User::from)
            .ok_or_else(|| BazaarError::not_found("user not found"))
    }
}
