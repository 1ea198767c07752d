use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_core::RequestContext;
use bazaar_core::auth::UserId;
use serde::Serialize;
use tracing::info;

use super::session_headers;
use crate::infra::app_state::AppState;
use crate::infra::errors::AppResult;
use crate::infra::middleware::session::AuthSession;

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct ActiveSessions {
    pub active_sessions: usize,
}

pub async fn is_auth(Extension(session): Extension<AuthSession>) -> Json<AuthStatus> {
    Json(AuthStatus {
        user_id: session.user_id,
    })
}

/// Number of live sessions of the caller. Tokens themselves are never
/// returned.
pub async fn sessions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<Json<ActiveSessions>> {
    let live = state.sessions.active_sessions(&ctx, session.user_id).await?;
    Ok(Json(ActiveSessions {
        active_sessions: live.len(),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<Response> {
    state.sessions.delete_session(&ctx, &session.token).await?;
    let csrf_token = state.csrf.issue()?;
    info!(user_id = session.user_id, "session revoked");

    Ok((session_headers(&state, None, &csrf_token), StatusCode::OK).into_response())
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<Response> {
    state
        .sessions
        .delete_all_sessions(&ctx, session.user_id)
        .await?;
    let csrf_token = state.csrf.issue()?;
    info!(user_id = session.user_id, "all sessions revoked");

    Ok((session_headers(&state, None, &csrf_token), StatusCode::OK).into_response())
}
