//! Trust boundary layer for the Bazaar classifieds backend.
//!
//! Everything that sits between an untrusted client and the marketplace's
//! data lives here:
//!
//! - [`auth::crypto`]: Argon2id credential hashing with raw salt/hash storage.
//! - [`auth::session_store`]: opaque session tokens over a TTL key-value
//!   store, with a per-user reverse index for bulk revocation.
//! - [`auth::csrf`]: stateless double-submit CSRF tokens.
//! - [`listing::image_admission`]: bounded probing of user-supplied image
//!   URLs before a listing is accepted.
//!
//! Every component call takes a [`RequestContext`] carrying the request id
//! recorded on tracing spans and the cancellation token for outbound work.

pub mod auth;
pub mod context;
pub mod database;
pub mod error;
pub mod kv;
pub mod listing;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::RequestContext;
pub use error::{BazaarError, Result};
