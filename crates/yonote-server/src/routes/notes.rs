//! Note routes: `/` and `/<key>/*`.
//!
//! Pages and form posts answer with HTML or redirects carrying a flash
//! message. The editor's JSON endpoints answer with JSON and map failures
//! through [`AppError`].

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use yonote_core::keygen::is_valid_key;
use yonote_core::note::{NoteUpdate, PasswordAction};
use yonote_core::time::{now, time_ago};

use crate::cookies::{auth_set, flash, store_auth_set, take_flash};
use crate::error::AppError;
use crate::extract::ClientAddr;
use crate::state::AppState;
use crate::views::{
    NoteView, edit_page, lockout_message, password_page, read_only_page, wrong_password_message,
};

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: enter the note password first.";

/// Build the note router.
///
/// Paths:
/// - `GET  /`: create a note under a random key and redirect to it
/// - `GET  /{key}`: edit, view, or password page
/// - `POST /{key}/verify`: password form
/// - `POST /{key}/update`: save form
/// - `POST /{key}/auto-save`: JSON content save
/// - `GET|POST /{key}/delete`: delete and redirect home
/// - `POST /{key}/verify-delete`, `/{key}/verify-download`: JSON password check
/// - `GET  /{key}/download`: plain-text attachment
/// - `GET  /{key}/get-timestamp`: last save time
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(create_note))
        .route("/{key}", get(view_note))
        .route("/{key}/verify", post(verify))
        .route("/{key}/update", post(update))
        .route("/{key}/auto-save", post(auto_save))
        .route("/{key}/delete", get(delete_note).post(delete_note))
        .route("/{key}/verify-delete", post(verify_action))
        .route("/{key}/verify-download", post(verify_action))
        .route("/{key}/download", get(download))
        .route("/{key}/get-timestamp", get(timestamp))
}

fn note_url(key: &str) -> String {
    format!("/{key}")
}

/// Accept only same-site absolute paths as a post-login redirect.
fn safe_next_url(next: Option<&str>, key: &str) -> String {
    match next {
        Some(url)
            if url.starts_with('/')
                && !url.starts_with("//")
                && !url.contains('\\')
                && !url.chars().any(char::is_control) =>
        {
            url.to_owned()
        }
        _ => note_url(key),
    }
}

// ── Pages ────────────────────────────────────────────────────────────

async fn create_note(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let note = state.notes.create_with_generated_key().await?;

    let mut auth = auth_set(&state, &jar);
    auth.insert(&note.key);
    let jar = store_auth_set(&state, jar, &auth);

    Ok((jar, Redirect::to(&format!("/{}?new=1", note.key))))
}

#[derive(Debug, Deserialize)]
struct ViewQuery {
    view: Option<String>,
    new: Option<String>,
    unlock: Option<String>,
}

async fn view_note(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<ViewQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if !is_valid_key(&key) {
        return Ok(Redirect::to("/").into_response());
    }

    let mut auth = auth_set(&state, &jar);
    let (note, created) = state.notes.get_or_create(&key).await?;
    let jar = if created {
        auth.insert(&key);
        store_auth_set(&state, jar, &auth)
    } else {
        jar
    };
    let (jar, flash_message) = take_flash(jar);

    let authenticated = auth.contains(&key);
    let content = state.notes.content(&note);
    let view = NoteView {
        key: &key,
        content: &content,
        updated_at: note.updated_at,
        has_password: note.has_password(),
        is_public: note.is_public,
        authenticated,
        is_new: created || query.new.is_some(),
    };

    if note.has_password() && !authenticated {
        if note.is_public && query.unlock.is_none() {
            return Ok((jar, read_only_page(&view, flash_message.as_deref())).into_response());
        }
        let page = password_page(&key, &note_url(&key), flash_message.as_deref());
        return Ok((jar, page).into_response());
    }

    if query.view.is_some() {
        return Ok((jar, read_only_page(&view, flash_message.as_deref())).into_response());
    }
    Ok((jar, edit_page(&view, flash_message.as_deref())).into_response())
}

// ── Password form ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VerifyForm {
    #[serde(default)]
    password: String,
    next_url: Option<String>,
}

async fn verify(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    ClientAddr(addr): ClientAddr,
    jar: CookieJar,
    Form(form): Form<VerifyForm>,
) -> Result<Response, AppError> {
    if !is_valid_key(&key) {
        return Ok(Redirect::to("/").into_response());
    }
    let next = safe_next_url(form.next_url.as_deref(), &key);

    let status = state.lockouts.check(&key, &addr).await?;
    if status.locked {
        let page = password_page(&key, &next, Some(&lockout_message(status.remaining_secs)));
        return Ok((StatusCode::TOO_MANY_REQUESTS, page).into_response());
    }

    let Some(note) = state.notes.read(&key).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let mut auth = auth_set(&state, &jar);
    if !note.has_password() || state.notes.verify_password(&note, &form.password).await {
        state.lockouts.record_success(&key, &addr).await?;
        auth.insert(&key);
        info!(note = %key, "note unlocked");
        let jar = store_auth_set(&state, jar, &auth);
        return Ok((jar, Redirect::to(&next)).into_response());
    }

    let outcome = state.lockouts.record_failure(&key, &addr).await?;
    let (status, message) = if outcome.locked {
        (
            StatusCode::TOO_MANY_REQUESTS,
            lockout_message(outcome.remaining_secs),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            wrong_password_message(outcome.attempts_remaining),
        )
    };
    Ok((status, password_page(&key, &next, Some(&message))).into_response())
}

// ── Save / delete forms ──────────────────────────────────────────────

fn default_password_action() -> String {
    "keep".to_owned()
}

#[derive(Debug, Deserialize)]
struct UpdateForm {
    #[serde(default)]
    content: String,
    #[serde(default = "default_password_action")]
    password_action: String,
    #[serde(default)]
    new_password: String,
    public: Option<String>,
}

async fn update(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    jar: CookieJar,
    Form(form): Form<UpdateForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    if !is_valid_key(&key) {
        return Ok((jar, Redirect::to("/")));
    }

    let mut auth = auth_set(&state, &jar);
    let (note, created) = state.notes.get_or_create(&key).await?;
    if created {
        auth.insert(&key);
    }

    if note.has_password() && !auth.contains(&key) {
        warn!(note = %key, "unauthenticated update rejected");
        let jar = flash(&state, jar, UNAUTHORIZED_MESSAGE);
        return Ok((jar, Redirect::to(&note_url(&key))));
    }

    let action = PasswordAction::from_form(&form.password_action, &form.new_password);
    let is_public = form
        .public
        .as_deref()
        .is_some_and(|v| !v.is_empty() && v != "0");

    let updated = state
        .notes
        .update(
            &key,
            NoteUpdate {
                content: form.content,
                password: action.clone(),
                is_public,
            },
        )
        .await?;

    match action {
        PasswordAction::Change(_) if updated.has_password() => {
            auth.insert(&key);
        }
        PasswordAction::Remove | PasswordAction::Change(_) => {
            auth.remove(&key);
        }
        PasswordAction::Keep => {}
    }

    let jar = store_auth_set(&state, jar, &auth);
    let jar = flash(&state, jar, "Note saved.");
    Ok((jar, Redirect::to(&note_url(&key))))
}

async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    if !is_valid_key(&key) {
        return Ok((jar, Redirect::to("/")));
    }

    let Some(note) = state.notes.read(&key).await? else {
        let jar = flash(&state, jar, "Note not found.");
        return Ok((jar, Redirect::to("/")));
    };

    let mut auth = auth_set(&state, &jar);
    if note.has_password() && !auth.contains(&key) {
        warn!(note = %key, "unauthenticated delete rejected");
        let jar = flash(&state, jar, UNAUTHORIZED_MESSAGE);
        return Ok((jar, Redirect::to(&note_url(&key))));
    }

    state.notes.delete(&key).await?;
    auth.remove(&key);

    let jar = store_auth_set(&state, jar, &auth);
    let jar = flash(&state, jar, "Note deleted.");
    Ok((jar, Redirect::to("/")))
}

// ── JSON endpoints ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AutoSaveRequest {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct AutoSaveResponse {
    status: &'static str,
    message: &'static str,
    timestamp: i64,
}

async fn auto_save(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    jar: CookieJar,
    payload: Result<Json<AutoSaveRequest>, JsonRejection>,
) -> Result<Json<AutoSaveResponse>, AppError> {
    let Json(request) = payload?;

    if !is_valid_key(&key) {
        return Err(AppError::NotFound(format!("note not found: {key}")));
    }
    let note = state
        .notes
        .read(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("note not found: {key}")))?;

    if note.has_password() && !auth_set(&state, &jar).contains(&key) {
        return Err(AppError::Forbidden("unauthorized".to_owned()));
    }

    let note = state.notes.update_content(&key, &request.content).await?;
    Ok(Json(AutoSaveResponse {
        status: "success",
        message: "Saved",
        timestamp: note.updated_at,
    }))
}

#[derive(Debug, Deserialize)]
struct VerifyActionRequest {
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct VerifyActionResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl VerifyActionResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
        })
    }

    fn fail(message: String) -> Json<Self> {
        Json(Self {
            success: false,
            message: Some(message),
        })
    }
}

/// Shared by `verify-delete` and `verify-download`: a lockout-aware password
/// check that also unlocks the note for this browser on success.
async fn verify_action(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    ClientAddr(addr): ClientAddr,
    jar: CookieJar,
    payload: Result<Json<VerifyActionRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<VerifyActionResponse>), AppError> {
    let Json(request) = payload?;

    let status = state.lockouts.check(&key, &addr).await?;
    if status.locked {
        return Ok((jar, VerifyActionResponse::fail(lockout_message(status.remaining_secs))));
    }

    let note = if is_valid_key(&key) {
        state.notes.read(&key).await?
    } else {
        None
    };
    let Some(note) = note else {
        return Ok((jar, VerifyActionResponse::fail("Note not found.".to_owned())));
    };

    if !note.has_password() {
        return Ok((jar, VerifyActionResponse::ok()));
    }

    if state.notes.verify_password(&note, &request.password).await {
        state.lockouts.record_success(&key, &addr).await?;
        let mut auth = auth_set(&state, &jar);
        auth.insert(&key);
        let jar = store_auth_set(&state, jar, &auth);
        return Ok((jar, VerifyActionResponse::ok()));
    }

    let outcome = state.lockouts.record_failure(&key, &addr).await?;
    let message = if outcome.locked {
        lockout_message(outcome.remaining_secs)
    } else {
        wrong_password_message(outcome.attempts_remaining)
    };
    Ok((jar, VerifyActionResponse::fail(message)))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    password: Option<String>,
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    ClientAddr(addr): ClientAddr,
    jar: CookieJar,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    if !is_valid_key(&key) {
        return Err(AppError::NotFound(format!("note not found: {key}")));
    }
    let note = state
        .notes
        .read(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("note not found: {key}")))?;

    if !note.is_readable_without_auth() && !auth_set(&state, &jar).contains(&key) {
        let Some(password) = query.password.filter(|p| !p.is_empty()) else {
            return Err(AppError::Forbidden("password required".to_owned()));
        };

        let status = state.lockouts.check(&key, &addr).await?;
        if status.locked {
            return Err(AppError::Locked {
                remaining_secs: status.remaining_secs,
            });
        }
        if !state.notes.verify_password(&note, &password).await {
            state.lockouts.record_failure(&key, &addr).await?;
            return Err(AppError::Forbidden("wrong password".to_owned()));
        }
        state.lockouts.record_success(&key, &addr).await?;
    }

    let content = state.notes.content(&note);
    let disposition = format!("attachment; filename=\"{key}.txt\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct TimestampResponse {
    timestamp: i64,
    time_ago: String,
}

async fn timestamp(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<TimestampResponse>, AppError> {
    let note = if is_valid_key(&key) {
        state.notes.read(&key).await?
    } else {
        None
    };
    let note = note.ok_or_else(|| AppError::NotFound(format!("note not found: {key}")))?;
    Ok(Json(TimestampResponse {
        timestamp: note.updated_at,
        time_ago: time_ago(note.updated_at, now()),
    }))
}
