//! # Bazaar Server
//!
//! HTTP surface of the Bazaar classifieds backend: account registration and
//! login, cookie sessions with double-submit CSRF protection, and listing
//! creation gated by a remote image check.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::handlers::CSRF_RESPONSE_HEADER;
use crate::infra::middleware::request_id::{REQUEST_ID_HEADER, request_context};

/// Assemble the application router with its middleware stack.
pub fn create_app(state: AppState, cors_allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(routes::create_api_router(state.clone()))
        // Outer to inner: CORS, request context, tracing
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_context))
        .layer(cors_layer(cors_allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Cookie sessions need credentialed CORS, which rules out a wildcard
    // origin. With no origins configured only same-origin callers work.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, CSRF_RESPONSE_HEADER])
        .expose_headers([CSRF_RESPONSE_HEADER, REQUEST_ID_HEADER])
        .allow_credentials(true)
}
