//! Double-submit CSRF protection.
//!
//! The guard keeps no server-side state. A token is handed to the browser
//! twice: as an `HttpOnly` cookie and as a value the client script can read
//! (the `X-CSRF-Token` response header, and the login body). A mutating
//! request is accepted only when it sends the value back in the
//! `X-CSRF-Token` request header and it matches the cookie.

use std::time::Duration;

use tracing::debug;

use super::cookies::{CSRF_COOKIE, build_cookie};
use super::token::{generate_token, secure_compare};
use crate::error::{BazaarError, Result};

pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Clone)]
pub struct CsrfGuard {
    max_age: Duration,
    secure_cookies: bool,
}

impl CsrfGuard {
    /// `max_age` should match the session TTL so both cookies age out
    /// together.
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            secure_cookies: false,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn issue(&self) -> Result<String> {
        generate_token()
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn cookie(&self, token: &str) -> String {
        build_cookie(CSRF_COOKIE, token, self.max_age, self.secure_cookies)
    }

    pub fn validate(
        &self,
        cookie_value: Option<&str>,
        header_value: Option<&str>,
    ) -> Result<()> {
        let (Some(cookie), Some(header)) = (cookie_value, header_value) else {
            debug!("csrf token missing from cookie or header");
            return Err(BazaarError::forbidden("missing CSRF token"));
        };

        if cookie.is_empty() || header.is_empty() {
            return Err(BazaarError::forbidden("missing CSRF token"));
        }

        if !secure_compare(cookie, header) {
            debug!("csrf cookie and header disagree");
            return Err(BazaarError::forbidden("invalid CSRF token"));
        }

        Ok(())
    }
}
