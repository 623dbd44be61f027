/// Utility functions for data processing and formatting
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Format a timestamp for logging
///
/// Uses RFC 3339 so log lines carry the same UTC instant that is written
/// to the database. Falls back to default string representation if
/// formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

/// Round a value to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render an optional measurement for log output
pub fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}
