//! Admin API, mounted under `/admin`.
//!
//! Login trades the admin password for an opaque session token carried in
//! a cookie scoped to `/admin`. Every other endpoint goes through the
//! [`AdminAuth`] extractor. All of it answers `404` when no admin password
//! hash is configured.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tower::limit::ConcurrencyLimitLayer;
use tracing::info;

use yonote_core::keygen::is_valid_key;
use yonote_core::note::{ListQuery, MAX_PAGE_SIZE, NoteDetail, NoteFilter, NotePage, NoteStats};
use yonote_core::sweeper::{SweepOptions, sweep_empty_notes};
use yonote_core::time::now;

use crate::cookies::{ADMIN_COOKIE, clear_admin_token, set_admin_token};
use crate::error::AppError;
use crate::extract::AdminAuth;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;

/// Build the admin router. Concurrency is capped since login runs a
/// deliberately slow password hash.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/stats", get(stats))
        .route("/notes", get(list_notes))
        .route("/notes/{key}", get(note_detail).delete(delete_note))
        .route("/notes-empty", delete(delete_empty_notes))
        .layer(ConcurrencyLimitLayer::new(10))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SuccessResponse>), AppError> {
    let Json(request) = payload?;
    let token = state.admin.login(&request.password).await?;
    info!("admin logged in");
    let jar = set_admin_token(&state, jar, token);
    Ok((jar, Json(SuccessResponse { success: true })))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>), AppError> {
    if let Some(cookie) = jar.get(ADMIN_COOKIE) {
        state.admin.logout(cookie.value()).await?;
    }
    Ok((clear_admin_token(jar), Json(SuccessResponse { success: true })))
}

async fn stats(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<NoteStats>, AppError> {
    Ok(Json(state.notes.stats().await?))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    page: Option<usize>,
    limit: Option<usize>,
    search: Option<String>,
    filter: Option<NoteFilter>,
}

impl ListParams {
    fn into_query(self) -> ListQuery {
        ListQuery {
            filter: self.filter.unwrap_or_default(),
            search: self.search.filter(|s| !s.trim().is_empty()),
            page: self.page.unwrap_or(1).max(1),
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

async fn list_notes(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<NotePage>, AppError> {
    Ok(Json(state.notes.list_page(&params.into_query()).await?))
}

async fn note_detail(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<NoteDetail>, AppError> {
    let not_found = || AppError::NotFound(format!("note not found: {key}"));
    if !is_valid_key(&key) {
        return Err(not_found());
    }
    let detail = state.notes.detail(&key).await?.ok_or_else(not_found)?;
    Ok(Json(detail))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    deleted: bool,
}

async fn delete_note(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    if !is_valid_key(&key) {
        return Err(AppError::NotFound(format!("note not found: {key}")));
    }
    let deleted = state.notes.delete(&key).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("note not found: {key}")));
    }
    info!(note = %key, "admin deleted note");
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

#[derive(Serialize)]
struct SweepResponse {
    success: bool,
    deleted: usize,
}

async fn delete_empty_notes(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepResponse>, AppError> {
    let options = SweepOptions {
        max_age_secs: None,
        dry_run: false,
    };
    let report = sweep_empty_notes(&state.notes, options, now()).await?;
    info!(deleted = report.deleted.len(), "admin removed empty notes");
    Ok(Json(SweepResponse {
        success: true,
        deleted: report.deleted.len(),
    }))
}
