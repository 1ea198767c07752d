pub mod cookies;
pub mod crypto;
pub mod csrf;
pub mod policy;
pub mod session_store;
pub mod token;

pub use crypto::{CredentialHasher, PasswordDigest};
pub use csrf::{CSRF_HEADER, CsrfGuard};
pub use session_store::{MAX_TOKEN_ATTEMPTS, SessionStore, UserId};
