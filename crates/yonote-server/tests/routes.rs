//! Router-level tests for the `yonote` server.
//!
//! Each test builds the full Axum router over an in-memory backend and
//! drives it with `tower::ServiceExt::oneshot`. A small cookie jar stands in
//! for the browser. The client address comes from `X-Forwarded-For`, so the
//! state is built with `trust_proxy` on.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use yonote_core::admin::AdminSessionStore;
use yonote_core::crypto::{ContentCipher, EncryptionKey};
use yonote_core::lockout::LockoutTracker;
use yonote_core::markdown::escape_html;
use yonote_core::note::{NoteStore, NoteUpdate, PasswordAction};
use yonote_core::password::hash_password_with_iterations;
use yonote_core::session::SessionSigner;
use yonote_server::app::build_router;
use yonote_server::state::AppState;
use yonote_server::views::wrong_password_message;
use yonote_storage::{MemoryBackend, StorageBackend};

const ADMIN_PASSWORD: &str = "correct horse";

fn test_state(admin_password: Option<&str>) -> Arc<AppState> {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    Arc::new(AppState {
        notes: NoteStore::new(
            Arc::clone(&storage),
            ContentCipher::new(EncryptionKey::generate()),
        )
        .with_password_iterations(10),
        lockouts: LockoutTracker::new(Arc::clone(&storage)),
        signer: SessionSigner::new(b"route-test-secret").unwrap(),
        admin: AdminSessionStore::new(
            storage,
            admin_password.map(|p| hash_password_with_iterations(p, 10)),
        ),
        cookie_secure: false,
        trust_proxy: true,
        environment: "test".to_owned(),
    })
}

/// Minimal browser: remembers cookies and sends a fixed client address.
struct Browser {
    app: Router,
    addr: &'static str,
    cookies: BTreeMap<String, String>,
}

impl Browser {
    fn new(state: &Arc<AppState>, addr: &'static str) -> Self {
        Self {
            app: build_router(Arc::clone(state)),
            addr,
            cookies: BTreeMap::new(),
        }
    }

    async fn send(
        &mut self,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: String,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", self.addr);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            if value.is_empty() {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_owned(), value.to_owned());
            }
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Method::GET, uri, None, String::new()).await
    }

    async fn form(&mut self, uri: &str, body: &str) -> Response<Body> {
        self.send(
            Method::POST,
            uri,
            Some("application/x-www-form-urlencoded"),
            body.to_owned(),
        )
        .await
    }

    async fn json(&mut self, method: Method, uri: &str, body: &Value) -> Response<Body> {
        self.send(method, uri, Some("application/json"), body.to_string())
            .await
    }
}

async fn text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&text(response).await).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
}

async fn protect(state: &AppState, key: &str, content: &str, password: &str, is_public: bool) {
    state.notes.create(key, content).await.unwrap();
    state
        .notes
        .update(
            key,
            NoteUpdate {
                content: content.to_owned(),
                password: PasswordAction::Change(password.to_owned()),
                is_public,
            },
        )
        .await
        .unwrap();
}

// ── Pages ────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_creates_note_and_redirects() {
    let state = test_state(None);
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser.get("/").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response).to_owned();
    assert!(target.starts_with('/') && target.ends_with("?new=1"), "{target}");
    assert!(browser.cookies.contains_key("yonote_auth"));

    let key = target.trim_start_matches('/').trim_end_matches("?new=1");
    assert!(state.notes.read(key).await.unwrap().is_some());

    let page = text(browser.get(&target).await).await;
    assert!(page.contains("id=\"note-form\""));
}

#[tokio::test]
async fn view_creates_missing_note() {
    let state = test_state(None);
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser.get("/hello").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("action=\"/hello/update\""));
    assert!(state.notes.read("hello").await.unwrap().is_some());
}

#[tokio::test]
async fn invalid_key_redirects_home() {
    let state = test_state(None);
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser.get("/ab").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(state.notes.read("ab").await.unwrap().is_none());
}

#[tokio::test]
async fn security_headers_are_set() {
    let state = test_state(None);
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser.get("/api/health").await;
    let headers = response.headers();
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(
        headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .contains("script-src 'self'")
    );
}

// ── Passwords and lockout ────────────────────────────────────────────

#[tokio::test]
async fn password_verify_and_lockout() {
    let state = test_state(None);
    protect(&state, "secret", "top secret", "abc", false).await;

    let mut attacker = Browser::new(&state, "10.0.0.66");
    let page = text(attacker.get("/secret").await).await;
    assert!(page.contains("action=\"/secret/verify\""));
    assert!(!page.contains(&escape_html("top secret")));

    for remaining in (1..=4).rev() {
        let response = attacker
            .form("/secret/verify", "password=xyz&next_url=%2Fsecret")
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let page = text(response).await;
        assert!(page.contains(&escape_html(&wrong_password_message(remaining))));
    }

    let response = attacker
        .form("/secret/verify", "password=xyz&next_url=%2Fsecret")
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Locked: even the right password is refused from this address.
    let response = attacker
        .form("/secret/verify", "password=abc&next_url=%2Fsecret")
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(!attacker.cookies.contains_key("yonote_auth"));

    // Another address is unaffected.
    let mut owner = Browser::new(&state, "10.0.0.1");
    let response = owner
        .form("/secret/verify", "password=abc&next_url=%2Fsecret%3Fview%3D1")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/secret?view=1");

    let page = text(owner.get("/secret").await).await;
    assert!(page.contains(&escape_html("top secret")));
    assert!(page.contains("action=\"/secret/update\""));
}

#[tokio::test]
async fn verify_rejects_offsite_next_url() {
    let state = test_state(None);
    protect(&state, "secret", "x", "abc", false).await;
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser
        .form("/secret/verify", "password=abc&next_url=%2F%2Fevil.example")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/secret");
}

#[tokio::test]
async fn tampered_session_cookie_is_ignored() {
    let state = test_state(None);
    protect(&state, "secret", "launchcodes", "abc", false).await;
    let mut browser = Browser::new(&state, "10.0.0.1");

    // Claims "secret" with a signature that does not match.
    browser.cookies.insert(
        "yonote_auth".to_owned(),
        "v1.eyJrZXlzIjp7InNlY3JldCI6dHJ1ZX19.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_owned(),
    );
    let page = text(browser.get("/secret").await).await;
    assert!(page.contains("action=\"/secret/verify\""));
    assert!(!page.contains("launchcodes"));
}

#[tokio::test]
async fn public_protected_note_is_read_only_for_strangers() {
    let state = test_state(None);
    protect(&state, "shared", "**hello**", "abc", true).await;
    let mut stranger = Browser::new(&state, "10.0.0.2");

    let page = text(stranger.get("/shared").await).await;
    assert!(page.contains("<strong>hello</strong>"));
    assert!(page.contains("/shared?unlock=1"));
    assert!(!page.contains("action=\"/shared/update\""));

    let page = text(stranger.get("/shared?unlock=1").await).await;
    assert!(page.contains("action=\"/shared/verify\""));
}

// ── Forms ────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_sets_password_and_flashes() {
    let state = test_state(None);
    let mut owner = Browser::new(&state, "10.0.0.1");
    owner.get("/draft").await;

    let response = owner
        .form(
            "/draft/update",
            "content=first+draft&password_action=change&new_password=pw&public=1",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/draft");

    let note = state.notes.read("draft").await.unwrap().unwrap();
    assert!(note.has_password());
    assert!(note.is_public);
    assert_eq!(state.notes.content(&note), "first draft");

    // Still authorized after setting the password, and the flash shows once.
    let page = text(owner.get("/draft").await).await;
    assert!(page.contains(&escape_html("Note saved.")));
    assert!(page.contains("action=\"/draft/update\""));
    let page = text(owner.get("/draft").await).await;
    assert!(!page.contains("class=\"flash\""));
}

#[tokio::test]
async fn update_without_auth_changes_nothing() {
    let state = test_state(None);
    protect(&state, "locked", "original", "abc", false).await;
    let mut stranger = Browser::new(&state, "10.0.0.2");

    let response = stranger
        .form("/locked/update", "content=defaced&password_action=remove")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/locked");

    let note = state.notes.read("locked").await.unwrap().unwrap();
    assert!(note.has_password());
    assert_eq!(state.notes.content(&note), "original");
}

#[tokio::test]
async fn delete_removes_note_and_session_entry() {
    let state = test_state(None);
    let mut owner = Browser::new(&state, "10.0.0.1");
    owner.get("/gone").await;
    assert!(owner.cookies.contains_key("yonote_auth"));

    let response = owner.form("/gone/delete", "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(state.notes.read("gone").await.unwrap().is_none());
    // The only entry was removed, so the cookie is dropped.
    assert!(!owner.cookies.contains_key("yonote_auth"));
}

#[tokio::test]
async fn delete_protected_requires_auth() {
    let state = test_state(None);
    protect(&state, "keep", "x", "abc", false).await;
    let mut stranger = Browser::new(&state, "10.0.0.2");

    let response = stranger.get("/keep/delete").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/keep");
    assert!(state.notes.read("keep").await.unwrap().is_some());
}

// ── JSON endpoints ───────────────────────────────────────────────────

#[tokio::test]
async fn auto_save_status_codes() {
    let state = test_state(None);
    protect(&state, "guarded", "x", "abc", false).await;
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser
        .send(
            Method::POST,
            "/open/auto-save",
            Some("application/json"),
            "{not json".to_owned(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");

    let response = browser
        .json(Method::POST, "/missing/auto-save", &json!({"content": "x"}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = browser
        .json(Method::POST, "/guarded/auto-save", &json!({"content": "x"}))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    browser.get("/open").await;
    let response = browser
        .json(Method::POST, "/open/auto-save", &json!({"content": "saved text"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["timestamp"].is_i64());

    let note = state.notes.read("open").await.unwrap().unwrap();
    assert_eq!(state.notes.content(&note), "saved text");
}

#[tokio::test]
async fn verify_action_unlocks_on_success() {
    let state = test_state(None);
    protect(&state, "vault", "x", "abc", false).await;
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser
        .json(Method::POST, "/vault/verify-delete", &json!({"password": "nope"}))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], wrong_password_message(4));

    let response = browser
        .json(Method::POST, "/vault/verify-download", &json!({"password": "abc"}))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body.get("message").is_none());

    let response = browser.get("/vault/download").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn download_headers_and_protection() {
    let state = test_state(None);
    state.notes.create("plain", "hello world").await.unwrap();
    protect(&state, "private", "classified", "abc", false).await;
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser.get("/plain/download").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"plain.txt\""
    );
    assert_eq!(text(response).await, "hello world");

    let response = browser.get("/private/download").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = browser.get("/private/download?password=wrong").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = browser.get("/private/download?password=abc").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "classified");

    let response = browser.get("/nothing/download").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn timestamp_endpoint() {
    let state = test_state(None);
    let note = state.notes.create("stamp", "x").await.unwrap();
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser.get("/stamp/get-timestamp").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["timestamp"], note.updated_at);
    assert_eq!(body["time_ago"], "just now");

    let response = browser.get("/nope/get-timestamp").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn render_markdown_endpoint() {
    let state = test_state(None);
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser
        .json(
            Method::POST,
            "/render-markdown",
            &json!({"content": "**bold** <script>alert(1)</script>"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_json(response).await["html"].as_str().unwrap().to_owned();
    assert!(html.contains("<strong>bold</strong>"));
    assert!(!html.contains("<script"));

    let response = browser
        .send(
            Method::POST,
            "/render-markdown",
            Some("application/json"),
            "[".to_owned(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_and_script() {
    let state = test_state(None);
    let mut browser = Browser::new(&state, "10.0.0.1");

    let body = body_json(browser.get("/api/health").await).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "test");

    let response = browser.get("/static/app.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/javascript")
    );
}

// ── Admin ────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_disabled_without_hash() {
    let state = test_state(None);
    let mut browser = Browser::new(&state, "10.0.0.1");

    let response = browser.get("/admin/stats").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = browser
        .json(Method::POST, "/admin/login", &json!({"password": "x"}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_login_stats_and_cleanup() {
    let state = test_state(Some(ADMIN_PASSWORD));
    state.notes.create("blank", "").await.unwrap();
    state.notes.create("full", "content").await.unwrap();
    protect(&state, "locked", "x", "abc", false).await;
    let mut admin = Browser::new(&state, "10.0.0.1");

    let response = admin.get("/admin/stats").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = admin
        .json(Method::POST, "/admin/login", &json!({"password": "wrong"}))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = admin
        .json(Method::POST, "/admin/login", &json!({"password": ADMIN_PASSWORD}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(admin.cookies.contains_key("yonote_admin"));

    let stats = body_json(admin.get("/admin/stats").await).await;
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["private"], 1);
    assert_eq!(stats["empty"], 1);
    assert_eq!(stats["recent"].as_array().map(Vec::len), Some(3));

    let detail = body_json(admin.get("/admin/notes/locked").await).await;
    assert_eq!(detail["key"], "locked");
    assert_eq!(detail["content"], "x");
    assert_eq!(detail["has_password"], true);
    assert!(detail.get("password_hash").is_none());
    let response = admin.get("/admin/notes/nosuchnote").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let page = body_json(admin.get("/admin/notes?filter=private").await).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["notes"][0]["key"], "locked");

    let page = body_json(admin.get("/admin/notes?search=CONTENT").await).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["notes"][0]["key"], "full");

    let response = admin
        .send(Method::DELETE, "/admin/notes-empty", None, String::new())
        .await;
    assert_eq!(body_json(response).await["deleted"], 1);
    assert!(state.notes.read("blank").await.unwrap().is_none());

    let response = admin
        .send(Method::DELETE, "/admin/notes/full", None, String::new())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.notes.read("full").await.unwrap().is_none());

    let response = admin.send(Method::POST, "/admin/logout", None, String::new()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!admin.cookies.contains_key("yonote_admin"));
    let response = admin.get("/admin/stats").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
