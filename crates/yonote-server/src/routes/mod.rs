//! HTTP route handlers for `yonote`.
//!
//! Routes are organized by surface:
//! - `notes`: note pages and the per-note JSON endpoints (`/<key>/*`)
//! - `api`: health, Markdown preview, and the editor script
//! - `admin`: the admin API under `/admin`

pub mod admin;
pub mod api;
pub mod notes;
