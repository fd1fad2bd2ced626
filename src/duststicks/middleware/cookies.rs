//! Cookie parsing and `Set-Cookie` rendering for the auth cookies.

use axum::http::{header::COOKIE, HeaderMap};
use chrono::{DateTime, Utc};

pub const SESSION_COOKIE_NAME: &str = "session_token";
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Value of the first cookie called `name` across all `Cookie` headers.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` for the session secret. Not visible to scripts.
#[must_use]
pub fn session_cookie(secret: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    set_cookie(SESSION_COOKIE_NAME, secret, expires_at, true, secure)
}

/// `Set-Cookie` for the CSRF secret. Readable by scripts so it can be echoed
/// back in the `X-CSRF-Token` header.
#[must_use]
pub fn csrf_cookie(secret: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    set_cookie(CSRF_COOKIE_NAME, secret, expires_at, false, secure)
}

/// `Set-Cookie` that makes the browser drop `name` immediately.
#[must_use]
pub fn clear_cookie(name: &str, http_only: bool, secure: bool) -> String {
    let mut cookie = format!("{name}=; Path=/; Max-Age=0; SameSite=Strict");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn set_cookie(
    name: &str,
    value: &str,
    expires_at: DateTime<Utc>,
    http_only: bool,
    secure: bool,
) -> String {
    let mut cookie = format!(
        "{name}={value}; Path=/; Expires={}; SameSite=Strict",
        expires_at.format(HTTP_DATE)
    );
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
