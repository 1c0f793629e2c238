//! Unix-second timestamps and the relative "time ago" label shown next to
//! the last-saved time.

/// Current wall-clock time as unix seconds.
#[must_use]
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Format how long ago `then` was, relative to `now`.
#[must_use]
pub fn time_ago(then: i64, now: i64) -> String {
    let diff = now.saturating_sub(then);
    if diff < 60 {
        return "just now".to_owned();
    }
    let (amount, unit) = if diff < 3_600 {
        (diff / 60, "minute")
    } else if diff < 86_400 {
        (diff / 3_600, "hour")
    } else if diff < 2_592_000 {
        (diff / 86_400, "day")
    } else if diff < 31_536_000 {
        (diff / 2_592_000, "month")
    } else {
        (diff / 31_536_000, "year")
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural} ago")
}

/// Render a unix timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
#[must_use]
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
