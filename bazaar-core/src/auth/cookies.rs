use std::time::Duration;

pub const SESSION_COOKIE: &str = "session_id";
pub const CSRF_COOKIE: &str = "csrf_token";

/// `Set-Cookie` value for an `HttpOnly`, `SameSite=Strict` cookie on `/`.
pub fn build_cookie(
    name: &str,
    value: &str,
    max_age: Duration,
    secure: bool,
) -> String {
    let mut cookie = format!(
        "{name}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop `name` immediately.
pub fn expired_cookie(name: &str, secure: bool) -> String {
    build_cookie(name, "", Duration::ZERO, secure)
}

/// Find `name` in a `Cookie` request header value. Empty values count as
/// absent.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}
