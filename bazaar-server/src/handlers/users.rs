use std::fmt;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use bazaar_core::auth::crypto::{HASH_LENGTH, SALT_LENGTH};
use bazaar_core::auth::{PasswordDigest, UserId, policy};
use bazaar_core::database::{NewUser, UserProfile};
use bazaar_core::{BazaarError, RequestContext};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{session_headers, start_session};
use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

const INVALID_CREDENTIALS: &str = "invalid login or password";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Response> {
    let RegisterRequest {
        login,
        password,
        first_name,
        last_name,
    } = request;
    let first_name = first_name.trim().to_string();
    let last_name = last_name.trim().to_string();

    policy::validate_login(&login)?;
    policy::validate_password(&password)?;
    policy::validate_name("first_name", &first_name)?;
    policy::validate_name("last_name", &last_name)?;

    let digest = hash_password(&state, password).await?;
    let user = state
        .users
        .create(
            &ctx,
            NewUser {
                login,
                first_name,
                last_name,
                digest,
            },
        )
        .await?;

    let (session_token, csrf_token) = start_session(&state, &ctx, user.id).await?;
    info!(user_id = user.id, "user registered");

    Ok((
        session_headers(&state, Some(&session_token), &csrf_token),
        Json(user.profile()),
    )
        .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Response> {
    policy::validate_login(&request.login)?;
    policy::validate_password(&request.password)?;

    let user = match state.users.find_by_login(&ctx, &request.login).await {
        Ok(user) => Some(user),
        Err(BazaarError::NotFound(_)) => None,
        Err(err) => return Err(err.into()),
    };

    // Unknown logins still pay for a hash so response timing does not
    // reveal which logins exist.
    let (hash, salt) = match &user {
        Some(user) => (user.password_hash.clone(), user.password_salt.clone()),
        None => (vec![0u8; HASH_LENGTH], vec![0u8; SALT_LENGTH]),
    };
    let verified = verify_password(&state, request.password, hash, salt).await?;

    let Some(user) = user.filter(|_| verified) else {
        return Err(AppError::forbidden(INVALID_CREDENTIALS));
    };

    let (session_token, csrf_token) = start_session(&state, &ctx, user.id).await?;
    info!(user_id = user.id, "user logged in");

    Ok((
        session_headers(&state, Some(&session_token), &csrf_token),
        Json(LoginResponse { token: csrf_token }),
    )
        .into_response())
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<UserId>,
) -> AppResult<Json<UserProfile>> {
    let user = state.users.find_by_id(&ctx, id).await?;
    Ok(Json(user.profile()))
}

async fn hash_password(
    state: &AppState,
    password: String,
) -> AppResult<PasswordDigest> {
    let hasher = state.hasher.clone();
    let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|err| {
            AppError::internal(format!("hashing task failed: {err}"))
        })??;
    Ok(digest)
}

async fn verify_password(
    state: &AppState,
    password: String,
    hash: Vec<u8>,
    salt: Vec<u8>,
) -> AppResult<bool> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash, &salt))
        .await
        .map_err(|err| AppError::internal(format!("verify task failed: {err}")))
}
