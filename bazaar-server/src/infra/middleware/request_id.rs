use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use bazaar_core::RequestContext;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Attach a [`RequestContext`] to every request.
///
/// A well-formed UUID in an inbound `X-Request-Id` is reused so ids survive
/// a proxy hop; anything else gets a fresh v7 id. The id is echoed on the
/// response. The context's cancellation token fires when the request
/// finishes or is dropped by a disconnecting client.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::now_v7);

    let ctx = RequestContext::with_request_id(request_id);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    req.extensions_mut().insert(ctx);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
