//! `yonote` HTTP server.
//!
//! Wires the core library and a storage backend into an Axum router. Serves
//! the note pages at `/<key>`, the JSON endpoints used by the editor, the
//! admin API under `/admin`, and `/api/health`.

pub mod app;
pub mod cleanup;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
pub mod views;
