use std::fmt;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-request observability and cancellation handle.
///
/// Created once by the HTTP layer for every inbound request and passed
/// explicitly into each trust-layer call. Components record `request_id` as
/// a span field and abort outbound work once `cancel` fires.
#[derive(Clone)]
pub struct RequestContext {
    request_id: Uuid,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_request_id(Uuid::now_v7())
    }

    pub fn with_request_id(request_id: Uuid) -> Self {
        Self {
            request_id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Abort every in-flight operation started with this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
