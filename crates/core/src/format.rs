//! Human-readable rendering of report values.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Placeholder for values that do not apply (unlimited threshold, unknown total...).
pub const NOT_APPLICABLE: &str = "N/A";

/// `strftime` pattern used for every timestamp in reports.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Render a duration as `"<d>d <h>hr <m>min <s>sec <ms>ms"`.
///
/// Leading units that are zero are omitted; once a unit is shown, every smaller
/// unit is shown too. Milliseconds are always shown.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis() as u64;
    let total_secs = total_ms / 1_000;
    let total_mins = total_secs / 60;
    let total_hours = total_mins / 60;
    let days = total_hours / 24;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if total_hours > 0 {
        out.push_str(&format!("{}hr ", total_hours % 24));
    }
    if total_mins > 0 {
        out.push_str(&format!("{}min ", total_mins % 60));
    }
    if total_secs > 0 {
        out.push_str(&format!("{}sec ", total_secs % 60));
    }
    out.push_str(&format!("{}ms", total_ms % 1_000));
    out
}

/// Render an error threshold, `None` meaning unlimited.
pub fn format_error_threshold(threshold: Option<u64>) -> String {
    match threshold {
        Some(t) => t.to_string(),
        None => NOT_APPLICABLE.to_string(),
    }
}

/// Percentage of `part` in `total`, `None` when `total` is zero.
pub fn percent(part: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| part as f64 * 100.0 / total as f64)
}

/// Render `"<count> (<pct>%)"`, or just `"<count>"` when `total` is zero.
pub fn format_count(count: u64, total: u64) -> String {
    match percent(count, total) {
        Some(pct) => format!("{count} ({pct:.1}%)"),
        None => count.to_string(),
    }
}

/// Render `"<current>/<total> (<pct>%)"`, or `"N/A"` when the total is unknown or zero.
pub fn format_progress(current: u64, total: Option<u64>) -> String {
    match total.and_then(|t| percent(current, t).map(|pct| (t, pct))) {
        Some((total, pct)) => format!("{current}/{total} ({pct:.1}%)"),
        None => NOT_APPLICABLE.to_string(),
    }
}
