//! Empty-note sweeper.
//!
//! Visiting an unused key creates an empty note, so abandoned keys pile up.
//! The sweeper deletes notes whose decrypted content is blank and that were
//! created before a cutoff. Notes that fail to decrypt are never treated as
//! empty.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::NoteError;
use crate::note::NoteStore;

/// Default minimum age before an empty note is swept.
pub const DEFAULT_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// What to sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    /// Only notes created at least this long ago. `None` sweeps every empty note.
    pub max_age_secs: Option<i64>,
    /// Report without deleting.
    pub dry_run: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            max_age_secs: Some(DEFAULT_MAX_AGE_SECS),
            dry_run: false,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    /// Keys removed, or that would be removed on a dry run.
    pub deleted: Vec<String>,
    pub dry_run: bool,
}

/// Delete blank notes older than the configured age.
///
/// # Errors
///
/// Returns the first storage failure. Notes deleted before it stay deleted.
pub async fn sweep_empty_notes(
    store: &NoteStore,
    options: SweepOptions,
    now: i64,
) -> Result<SweepReport, NoteError> {
    let cutoff = options.max_age_secs.map(|age| now.saturating_sub(age));
    let mut report = SweepReport {
        dry_run: options.dry_run,
        ..SweepReport::default()
    };

    for note in store.list().await? {
        report.scanned += 1;

        if cutoff.is_some_and(|cutoff| note.created_at >= cutoff) {
            continue;
        }

        let content = match store.try_content(&note) {
            Ok(content) => content,
            Err(e) => {
                warn!(note = %note.key, error = %e, "skipping undecryptable note");
                continue;
            }
        };
        if !content.trim().is_empty() {
            continue;
        }

        if !options.dry_run {
            store.delete(&note.key).await?;
        }
        info!(note = %note.key, created_at = note.created_at, dry_run = options.dry_run, "empty note swept");
        report.deleted.push(note.key);
    }

    Ok(report)
}
