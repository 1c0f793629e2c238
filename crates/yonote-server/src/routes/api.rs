//! Health check, Markdown preview, and the editor script.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use yonote_core::markdown::render;
use yonote_core::time::now;

use crate::error::AppError;
use crate::state::AppState;

const APP_JS: &str = include_str!("../../static/app.js");

/// Build the API router.
///
/// Paths:
/// - `GET  /api/health`
/// - `POST /render-markdown`
/// - `GET  /static/app.js`
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/render-markdown", post(render_markdown))
        .route("/static/app.js", get(script))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    environment: String,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: now(),
        environment: state.environment.clone(),
    })
}

#[derive(Deserialize)]
struct RenderRequest {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct RenderResponse {
    html: String,
}

async fn render_markdown(
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Json<RenderResponse>, AppError> {
    let Json(request) = payload?;
    Ok(Json(RenderResponse {
        html: render(&request.content),
    }))
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        APP_JS,
    )
}
