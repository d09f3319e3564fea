use crate::apply::Summary;
use crate::manifest::Stamp;
use crate::reconcile::Change;
use colored::Colorize;

/// Human-readable size, binary units
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    #[allow(clippy::cast_precision_loss)]
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{bytes} {}", UNITS[unit_index])
    } else {
        format!("{size:.2} {}", UNITS[unit_index])
    }
}

/// A stamp for display, `never` when absent
#[must_use]
pub fn format_stamp(stamp: Option<Stamp>) -> String {
    stamp.map_or_else(|| "never".to_string(), |s| s.to_string())
}

/// How long ago a stamp was, relative to `now`
#[must_use]
pub fn format_relative(stamp: Stamp, now: Stamp) -> String {
    let diff = (now.naive() - stamp.naive()).num_seconds();
    if diff < 0 {
        return "in the future".to_string();
    }

    let (value, unit) = if diff < 60 {
        (diff, "second")
    } else if diff < 3600 {
        (diff / 60, "minute")
    } else if diff < 86400 {
        (diff / 3600, "hour")
    } else if diff < 2_592_000 {
        (diff / 86400, "day")
    } else if diff < 31_536_000 {
        (diff / 2_592_000, "month")
    } else {
        (diff / 31_536_000, "year")
    };

    if value == 1 {
        format!("{value} {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

/// One listing line: `  3) [update] notes.md  <- /home/me/notes.md`
#[must_use]
pub fn format_change(change: &Change) -> String {
    format!(
        "{:>3}) [{}] {}  {} {}",
        change.position,
        change.status.colored_label(),
        change.name.bold(),
        "<-".dimmed(),
        change.source_path.display()
    )
}

/// One short listing line: `U notes.md`
#[must_use]
pub fn format_change_short(change: &Change) -> String {
    format!("{} {}", change.status.short_char(), change.name)
}

/// `2 applied, 1 skipped, 0 failed`
#[must_use]
pub fn format_summary(summary: Summary) -> String {
    format!(
        "{} applied, {} skipped, {} failed",
        summary.applied, summary.skipped, summary.failed
    )
}
