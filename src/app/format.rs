use chrono::{DateTime, Local};

use super::result::Timestamp;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

/// Collapses runs of whitespace (including newlines) into single spaces.
pub(crate) fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub(crate) fn format_timestamp(timestamp: Option<&Timestamp>) -> String {
    timestamp
        .and_then(Timestamp::seconds)
        .map(format_clock)
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn format_time_range(start: Option<&Timestamp>, end: Option<&Timestamp>) -> String {
    match (start, end) {
        (None, None) => "-".to_string(),
        _ => format!("{} - {}", format_timestamp(start), format_timestamp(end)),
    }
}

pub(crate) fn format_completed_at(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_adds_ellipsis_only_when_needed() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long title", 10), "a rathe...");
    }

    #[test]
    fn single_line_collapses_whitespace() {
        assert_eq!(single_line("  one\n two\t\tthree "), "one two three");
    }

    #[test]
    fn clock_formats_minutes_and_hours() {
        assert_eq!(format_clock(5.43), "0:05");
        assert_eq!(format_clock(125.0), "2:05");
        assert_eq!(format_clock(3725.9), "1:02:05");
        assert_eq!(format_clock(-4.0), "0:00");
    }

    #[test]
    fn time_range_degrades_to_dashes() {
        let start = Timestamp::Text("65.2s".to_string());
        let bad = Timestamp::Text("abc".to_string());
        assert_eq!(format_time_range(Some(&start), Some(&bad)), "1:05 - -");
        assert_eq!(format_time_range(None, None), "-");
    }
}
