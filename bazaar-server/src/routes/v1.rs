use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::handlers::{ads, auth, users};
use crate::infra::app_state::AppState;
use crate::infra::middleware::session::{require_csrf, require_session};

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        // Public endpoints; registration and login establish the session
        // and CSRF pair, so they cannot require either.
        .route("/user/register", post(users::register))
        .route("/user/login", post(users::login))
        .route("/ad/all", get(ads::list))
        .route("/ad/{id}", get(ads::get))
        .merge(create_session_routes(state.clone()))
        .merge(create_mutating_routes(state))
}

/// Read-only routes that require a live session
fn create_session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/isAuth", get(auth::is_auth))
        .route("/auth/sessions", get(auth::sessions))
        .route("/user/profile/{id}", get(users::profile))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

/// State-changing routes: session first, then the CSRF pair
fn create_mutating_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logoutAll", post(auth::logout_all))
        .route("/ad/create", post(ads::create))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_csrf,
        ))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}
