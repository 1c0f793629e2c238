//! Request extractors: the client address used for lockouts, and the admin
//! session guard.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use yonote_core::admin::AdminSession;

use crate::cookies::ADMIN_COOKIE;
use crate::error::AppError;
use crate::state::AppState;

/// Address lockouts are keyed by.
///
/// Taken from `CF-Connecting-IP`, then the first `X-Forwarded-For` entry,
/// when the server is configured to trust its proxy. Otherwise the peer
/// socket address. `"unknown"` when neither is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

fn forwarded_addr(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("cf-connecting-ip") {
        return Some(ip.to_owned());
    }
    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl FromRequestParts<Arc<AppState>> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_proxy {
            if let Some(addr) = forwarded_addr(&parts.headers) {
                return Ok(Self(addr));
            }
        }
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_owned(), |ci| ci.0.ip().to_string());
        Ok(Self(addr))
    }
}

/// Extractor that requires a live admin session.
#[derive(Debug)]
pub struct AdminAuth {
    pub session: AdminSession,
    pub token: String,
}

impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if !state.admin.is_enabled() {
            return Err(AppError::NotFound("admin access is not configured".to_owned()));
        }
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ADMIN_COOKIE)
            .map(|c| c.value().to_owned())
            .ok_or_else(|| AppError::Unauthorized("admin login required".to_owned()))?;
        let session = state.admin.lookup(&token).await?;
        Ok(Self { session, token })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_header_priority() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_addr(&headers), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        assert_eq!(forwarded_addr(&headers).as_deref(), Some("10.0.0.1"));

        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(forwarded_addr(&headers).as_deref(), Some("203.0.113.9"));
    }
}
