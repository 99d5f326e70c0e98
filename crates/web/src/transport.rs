//! How tokens travel over HTTP.
//!
//! A token arrives either as the `auth` request parameter or in a cookie
//! whose name starts with `auth` followed by the issue time in
//! milliseconds. When several such cookies are present the one with the
//! greatest name wins.

use std::collections::HashMap;

use actix_web::cookie::{time::Duration, Cookie};
use actix_web::{web, HttpRequest};
use signed_auth::Timestamp;

pub const AUTH_PARAMETER: &str = "auth";
pub const AUTH_COOKIE_PREFIX: &str = "auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    path: String,
    max_age_secs: Option<i64>,
}

impl CookieSettings {
    pub fn new(context_path: &str, expiry_timeout_secs: i64) -> Self {
        Self {
            path: cookie_path(context_path),
            max_age_secs: (expiry_timeout_secs > 0).then_some(expiry_timeout_secs),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// The context path with exactly one trailing `/`.
pub fn cookie_path(context_path: &str) -> String {
    let mut path = context_path.trim().to_owned();
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

pub fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Ok(params) = web::Query::<HashMap<String, String>>::from_query(req.query_string()) {
        if let Some(token) = params.get(AUTH_PARAMETER) {
            return Some(normalize(token));
        }
    }

    let cookies = req.cookies().ok()?;
    let token = cookies
        .iter()
        .filter(|c| c.name().starts_with(AUTH_COOKIE_PREFIX))
        .max_by(|a, b| a.name().cmp(b.name()))
        .map(|c| normalize(c.value()));
    token
}

/// Undo transport re-encoding: percent-escapes are decoded and spaces,
/// which form decoding makes out of `+`, are turned back into `+`.
pub fn normalize(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| raw.to_owned());
    decoded.replace(' ', "+")
}

pub fn auth_cookie(token: &str, settings: &CookieSettings, issued_at: Timestamp) -> Cookie<'static> {
    let mut cookie = Cookie::build(
        format!("{AUTH_COOKIE_PREFIX}{}", issued_at.as_millis()),
        token.to_owned(),
    )
    .path(settings.path.clone())
    .http_only(true)
    .finish();
    if let Some(secs) = settings.max_age_secs {
        cookie.set_max_age(Duration::seconds(secs));
    }
    cookie
}

/// Removal cookies for every auth cookie the client sent.
pub fn expired_cookies(req: &HttpRequest, settings: &CookieSettings) -> Vec<Cookie<'static>> {
    let Ok(cookies) = req.cookies() else {
        return Vec::new();
    };
    let expired = cookies
        .iter()
        .filter(|c| c.name().starts_with(AUTH_COOKIE_PREFIX))
        .map(|c| {
            Cookie::build(c.name().to_owned(), "")
                .path(settings.path.clone())
                .max_age(Duration::ZERO)
                .finish()
        })
        .collect();
    expired
}
