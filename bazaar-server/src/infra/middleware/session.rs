//! Session and CSRF gates for routes that act on behalf of a user.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Extensions, HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use bazaar_core::auth::UserId;
use bazaar_core::auth::cookies::{CSRF_COOKIE, SESSION_COOKIE, find_cookie};
use bazaar_core::auth::csrf::CSRF_HEADER;
use bazaar_core::{BazaarError, RequestContext};
use tracing::warn;

use crate::infra::app_state::AppState;
use crate::infra::errors::AppError;

/// The caller's resolved session, inserted by [`require_session`].
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: UserId,
    pub token: String,
}

pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| find_cookie(value, name))
        .map(str::to_string)
}

pub(crate) fn context_of(extensions: &Extensions) -> RequestContext {
    extensions
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
}

/// Reject requests without a live `session_id` cookie.
///
/// Each authenticated request renews the session and the owner's index to
/// the full TTL, so active sessions slide while idle ones expire.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_cookie(req.headers(), SESSION_COOKIE)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let ctx = context_of(req.extensions());
    let user_id = match state.sessions.refresh_session(&ctx, &token).await {
        Ok(user_id) => user_id,
        Err(BazaarError::NotFound(_)) => {
            return Err(AppError::unauthorized("Authentication required"));
        }
        Err(err) => return Err(err.into()),
    };

    req.extensions_mut().insert(AuthSession { user_id, token });
    Ok(next.run(req).await)
}

/// Double-submit check: the `X-CSRF-Token` header must match the
/// `csrf_token` cookie. Layer inside [`require_session`].
pub async fn require_csrf(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie = request_cookie(req.headers(), CSRF_COOKIE);
    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok());

    state.csrf.validate(cookie.as_deref(), header)?;
    Ok(next.run(req).await)
}

/// Session of the caller, if any. Used on public reads where the viewer
/// only changes the response.
///
/// Never rejects: when the session store is unavailable the request is
/// served anonymously and the failure is logged, so public pages stay up
/// while authenticated routes return 500.
#[derive(Debug, Clone, Default)]
pub struct OptionalSession(pub Option<UserId>);

impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = request_cookie(&parts.headers, SESSION_COOKIE) else {
            return Ok(Self(None));
        };

        let ctx = context_of(&parts.extensions);
        match state.sessions.get_session(&ctx, &token).await {
            Ok(user_id) => Ok(Self(Some(user_id))),
            Err(BazaarError::NotFound(_)) => Ok(Self(None)),
            Err(err) => {
                warn!(error = %err, "session lookup failed, serving anonymously");
                Ok(Self(None))
            }
        }
    }
}
