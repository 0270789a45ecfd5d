use chrono::{DateTime, FixedOffset};

use crate::clock::{local_date, DAY_MS};

/// Human-readable description of when a review is due, relative to `now`.
pub fn format_review_date(timestamp: i64, now: &DateTime<FixedOffset>) -> String {
    if timestamp == 0 {
        return "complete".to_string();
    }

    let diff = timestamp - now.timestamp_millis();
    if diff < 0 {
        return match diff.abs() / DAY_MS {
            0 => "overdue today".to_string(),
            1 => "overdue by 1 day".to_string(),
            days => format!("overdue by {} days", days),
        };
    }

    let Some(due_day) = local_date(timestamp, now) else {
        return "unknown".to_string();
    };
    match (due_day - now.date_naive()).num_days() {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        days if days <= 7 => format!("in {} days", days),
        _ => due_day.format("%b %-d").to_string(),
    }
}
