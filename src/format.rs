//! Presentation formatters
//!
//! Pure helpers turning raw object metadata into display strings.

use chrono::{DateTime, Utc};
use serde::Serialize;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Human-readable size in binary units with at most two decimals.
///
/// `2097152` → `"2 MB"`, `1536` → `"1.5 KB"`, `0` → `"0 Bytes"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    while unit < SIZE_UNITS.len() - 1 && bytes >= 1024u64.pow(unit as u32 + 1) {
        unit += 1;
    }

    // ties round up: 1152 B is 1.125 KB -> "1.13 KB"
    let value = bytes as f64 / 1024f64.powi(unit as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}

/// Age of `date` relative to `now`, in whole days rounded up.
pub fn format_relative_date(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_ms = (now - date).num_milliseconds().abs();
    let days = (diff_ms + MS_PER_DAY - 1) / MS_PER_DAY;

    if days == 1 {
        "Yesterday".to_string()
    } else if days < 7 {
        format!("{} days ago", days)
    } else if days < 30 {
        format!("{} weeks ago", ceil_div(days, 7))
    } else if days < 365 {
        format!("{} months ago", ceil_div(days, 30))
    } else {
        date.format("%-m/%-d/%Y").to_string()
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// Icon category of a file, keyed by MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IconKind {
    Image,
    Video,
    Audio,
    Pdf,
    Word,
    Excel,
    PowerPoint,
    Archive,
    Text,
    Generic,
}

impl IconKind {
    /// Font Awesome class for web front ends
    pub fn css_class(&self) -> &'static str {
        match self {
            IconKind::Image => "fas fa-image",
            IconKind::Video => "fas fa-video",
            IconKind::Audio => "fas fa-music",
            IconKind::Pdf => "fas fa-file-pdf",
            IconKind::Word => "fas fa-file-word",
            IconKind::Excel => "fas fa-file-excel",
            IconKind::PowerPoint => "fas fa-file-powerpoint",
            IconKind::Archive => "fas fa-file-archive",
            IconKind::Text => "fas fa-file-alt",
            IconKind::Generic => "fas fa-file",
        }
    }

    /// Short label for terminal output
    pub fn label(&self) -> &'static str {
        match self {
            IconKind::Image => "image",
            IconKind::Video => "video",
            IconKind::Audio => "audio",
            IconKind::Pdf => "pdf",
            IconKind::Word => "word",
            IconKind::Excel => "sheet",
            IconKind::PowerPoint => "slides",
            IconKind::Archive => "archive",
            IconKind::Text => "text",
            IconKind::Generic => "file",
        }
    }
}

/// First matching rule wins: media prefixes, then document substrings.
pub fn file_icon(mime_type: &str) -> IconKind {
    let has = |needle: &str| mime_type.contains(needle);

    if mime_type.starts_with("image/") {
        IconKind::Image
    } else if mime_type.starts_with("video/") {
        IconKind::Video
    } else if mime_type.starts_with("audio/") {
        IconKind::Audio
    } else if has("pdf") {
        IconKind::Pdf
    } else if has("word") {
        IconKind::Word
    } else if has("excel") || has("spreadsheet") {
        IconKind::Excel
    } else if has("powerpoint") || has("presentation") {
        IconKind::PowerPoint
    } else if has("zip") || has("rar") {
        IconKind::Archive
    } else if has("text") {
        IconKind::Text
    } else {
        IconKind::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[test]
    fn test_format_file_size_rounds_ties_up() {
        assert_eq!(format_file_size(1152), "1.13 KB");
        assert_eq!(format_file_size(1664), "1.63 KB");
        assert_eq!(format_file_size(2688), "2.63 KB");
        assert_eq!(format_file_size(1023), "1023 Bytes");
        assert_eq!(format_file_size(1030), "1.01 KB");
    }

    #[test]
    fn test_format_file_size_stays_in_gb() {
        assert_eq!(format_file_size(2 * 1024u64.pow(4)), "2048 GB");
    }

    #[test]
    fn test_relative_date_thresholds() {
        let now = now();
        assert_eq!(format_relative_date(now - Duration::days(1), now), "Yesterday");
        assert_eq!(format_relative_date(now - Duration::days(6), now), "6 days ago");
        assert_eq!(format_relative_date(now - Duration::days(8), now), "2 weeks ago");
        assert_eq!(format_relative_date(now - Duration::days(7), now), "1 weeks ago");
        assert_eq!(format_relative_date(now - Duration::days(45), now), "2 months ago");
        assert_eq!(format_relative_date(now - Duration::hours(36), now), "2 days ago");
        assert_eq!(format_relative_date(now - Duration::hours(3), now), "Yesterday");
    }

    #[test]
    fn test_relative_date_absolute_after_a_year() {
        let now = now();
        let old = Utc.with_ymd_and_hms(2023, 3, 9, 8, 0, 0).unwrap();
        assert_eq!(format_relative_date(old, now), "3/9/2023");
    }

    #[test]
    fn test_file_icon_rules() {
        assert_eq!(file_icon("image/png"), IconKind::Image);
        assert_eq!(file_icon("video/mp4"), IconKind::Video);
        assert_eq!(file_icon("audio/mpeg"), IconKind::Audio);
        assert_eq!(file_icon("application/pdf"), IconKind::Pdf);
        assert_eq!(
            file_icon("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            IconKind::Word
        );
        assert_eq!(
            file_icon("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
            IconKind::Excel
        );
        assert_eq!(
            file_icon("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
            IconKind::PowerPoint
        );
        assert_eq!(file_icon("application/zip"), IconKind::Archive);
        assert_eq!(file_icon("text/plain"), IconKind::Text);
        assert_eq!(file_icon("application/octet-stream"), IconKind::Generic);
        assert_eq!(file_icon("image/png").css_class(), "fas fa-image");
    }
}
