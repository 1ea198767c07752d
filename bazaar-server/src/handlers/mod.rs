pub mod ads;
pub mod auth;
pub mod users;

use axum::Json;
use axum::http::{HeaderName, header::SET_COOKIE};
use axum::response::AppendHeaders;
use bazaar_core::RequestContext;
use bazaar_core::auth::UserId;
use bazaar_core::auth::cookies::{SESSION_COOKIE, build_cookie, expired_cookie};
use serde_json::{Value, json};

use crate::infra::app_state::AppState;
use crate::infra::errors::AppResult;

pub const CSRF_RESPONSE_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

pub type CookieHeaders = AppendHeaders<Vec<(HeaderName, String)>>;

/// `Set-Cookie` and `X-CSRF-Token` headers for a session change.
///
/// `session_token` of `None` expires the session cookie. A fresh CSRF token
/// is always issued, so the anti-forgery value rotates whenever the session
/// identity does.
pub(crate) fn session_headers(
    state: &AppState,
    session_token: Option<&str>,
    csrf_token: &str,
) -> CookieHeaders {
    let session_cookie = match session_token {
        Some(token) => build_cookie(
            SESSION_COOKIE,
            token,
            state.sessions.ttl(),
            state.cookie_secure,
        ),
        None => expired_cookie(SESSION_COOKIE, state.cookie_secure),
    };

    AppendHeaders(vec![
        (SET_COOKIE, session_cookie),
        (SET_COOKIE, state.csrf.cookie(csrf_token)),
        (CSRF_RESPONSE_HEADER, csrf_token.to_string()),
    ])
}

/// Create a session for `user_id` and a CSRF token to pair with it.
pub(crate) async fn start_session(
    state: &AppState,
    ctx: &RequestContext,
    user_id: UserId,
) -> AppResult<(String, String)> {
    let session_token = state.sessions.create_session(ctx, user_id).await?;
    let csrf_token = state.csrf.issue()?;
    Ok((session_token, csrf_token))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
