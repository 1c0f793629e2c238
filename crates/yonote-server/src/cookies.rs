//! Cookies: the signed auth set, one-shot flash messages, and the admin
//! session token.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use time::Duration;

use yonote_core::admin::SESSION_TTL_SECS;
use yonote_core::session::AuthSet;

use crate::state::AppState;

/// Carries the signed [`AuthSet`].
pub const AUTH_COOKIE: &str = "yonote_auth";

/// Carries one flash message to the next page render.
pub const FLASH_COOKIE: &str = "yonote_flash";

/// Carries the admin session token.
pub const ADMIN_COOKIE: &str = "yonote_admin";

const AUTH_MAX_AGE_SECS: i64 = 3600;
const FLASH_MAX_AGE_SECS: i64 = 60;

/// Decode the auth set from the request cookies. Invalid cookies read as empty.
#[must_use]
pub fn auth_set(state: &AppState, jar: &CookieJar) -> AuthSet {
    state
        .signer
        .decode_or_empty(jar.get(AUTH_COOKIE).map(Cookie::value))
}

/// Write the auth set back, or drop the cookie when the set is empty.
#[must_use]
pub fn store_auth_set(state: &AppState, jar: CookieJar, set: &AuthSet) -> CookieJar {
    if set.is_empty() {
        return jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    }
    jar.add(
        Cookie::build((AUTH_COOKIE, state.signer.encode(set)))
            .path("/")
            .http_only(true)
            .secure(state.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(AUTH_MAX_AGE_SECS)),
    )
}

/// Queue a message for the next rendered page.
#[must_use]
pub fn flash(state: &AppState, jar: CookieJar, message: &str) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, URL_SAFE_NO_PAD.encode(message)))
            .path("/")
            .http_only(true)
            .secure(state.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(FLASH_MAX_AGE_SECS)),
    )
}

/// Consume the pending flash message, if any.
#[must_use]
pub fn take_flash(jar: CookieJar) -> (CookieJar, Option<String>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };
    let message = URL_SAFE_NO_PAD
        .decode(cookie.value())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|m| !m.is_empty());
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), message)
}

/// Set the admin session cookie.
#[must_use]
pub fn set_admin_token(state: &AppState, jar: CookieJar, token: String) -> CookieJar {
    jar.add(
        Cookie::build((ADMIN_COOKIE, token))
            .path("/admin")
            .http_only(true)
            .secure(state.cookie_secure)
            .same_site(SameSite::Strict)
            .max_age(Duration::seconds(SESSION_TTL_SECS)),
    )
}

/// Drop the admin session cookie.
#[must_use]
pub fn clear_admin_token(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ADMIN_COOKIE).path("/admin"))
}
