//! Core library for `yonote`.
//!
//! Contains the note store, the content encryption adapter, password hashing,
//! the per-client lockout tracker, the signed session auth set, the Markdown
//! render/sanitize pipeline, the empty-note sweeper, and admin sessions. This
//! crate depends on `yonote-storage` for the storage backend trait and knows
//! nothing about HTTP.

pub mod admin;
pub mod crypto;
pub mod error;
pub mod keygen;
pub mod lockout;
pub mod markdown;
pub mod note;
pub mod password;
pub mod session;
pub mod sweeper;
pub mod time;
