use anyhow::Context;
use axum::http::{header, HeaderMap, HeaderValue};

pub const SESSION_COOKIE: &str = "token";

fn cookie(value: &str, max_age_secs: i64, secure: bool) -> anyhow::Result<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    let raw = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
        SESSION_COOKIE, value, max_age_secs, secure
    );
    HeaderValue::from_str(&raw).context("build session cookie")
}

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> anyhow::Result<HeaderValue> {
    cookie(token, max_age_secs, secure)
}

/// `Set-Cookie` value that makes the browser drop the session.
pub fn clear_session_cookie(secure: bool) -> anyhow::Result<HeaderValue> {
    cookie("", 0, secure)
}

/// Session token from the `token` cookie, else from `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        auth.strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}
