//! Background cleanup: empty-note sweeping, expired lockouts, and expired
//! admin sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use yonote_core::error::{AdminError, LockoutError, NoteError};
use yonote_core::sweeper::{SweepOptions, sweep_empty_notes};
use yonote_core::time::now;

use crate::state::AppState;

/// Consecutive failed ticks before logging escalates to `error`.
const FAILURE_ESCALATION: u32 = 5;

/// What one tick removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub notes_deleted: usize,
    pub lockouts_purged: usize,
    pub sessions_purged: usize,
}

/// The cleanup step that failed.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("empty-note sweep failed: {0}")]
    Sweep(#[from] NoteError),

    #[error("lockout purge failed: {0}")]
    Lockouts(#[from] LockoutError),

    #[error("admin session purge failed: {0}")]
    Sessions(#[from] AdminError),
}

/// Run one cleanup pass at `now`.
///
/// Empty notes older than a day are deleted. Lockouts and admin sessions
/// past their expiry are purged.
///
/// # Errors
///
/// Returns the first failing step. Earlier steps keep their effect.
pub async fn cleanup_tick(state: &AppState, now: i64) -> Result<CleanupReport, CleanupError> {
    let sweep = sweep_empty_notes(&state.notes, SweepOptions::default(), now).await?;
    let lockouts_purged = state.lockouts.purge_expired(now).await?;
    let sessions_purged = state.admin.purge_expired(now).await?;

    Ok(CleanupReport {
        notes_deleted: sweep.deleted.len(),
        lockouts_purged,
        sessions_purged,
    })
}

/// Periodically run [`cleanup_tick`] until shutdown is signalled.
///
/// The first tick fires immediately. A failing tick is logged and retried on
/// the next interval; persistent failures escalate to `error`.
pub async fn cleanup_worker(
    state: Arc<AppState>,
    shutdown: &mut watch::Receiver<bool>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut consecutive_failures: u32 = 0;
    info!(interval_secs, "cleanup worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match cleanup_tick(&state, now()).await {
                    Ok(report) if report == CleanupReport::default() => {
                        consecutive_failures = 0;
                        debug!("cleanup tick found nothing to remove");
                    }
                    Ok(report) => {
                        consecutive_failures = 0;
                        info!(
                            notes_deleted = report.notes_deleted,
                            lockouts_purged = report.lockouts_purged,
                            sessions_purged = report.sessions_purged,
                            "cleanup tick complete"
                        );
                    }
                    Err(e) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        if consecutive_failures >= FAILURE_ESCALATION {
                            error!(
                                error = %e,
                                consecutive_failures,
                                "cleanup persistently failing, storage may be down"
                            );
                        } else {
                            warn!(error = %e, consecutive_failures, "cleanup tick failed");
                        }
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("cleanup worker shutting down");
                return;
            }
        }
    }
}
