//! Shared HTTP utilities for the guest registry workspace.
//!
//! Provides common response builders and time formatting used by the
//! api-server.

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "invalid_request" => "Invalid request",
        "empty" => "Nothing to do",
        "conflict" => "Resource already exists",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render the human-readable entry stamp stored next to the sortable
/// instant, e.g. `1/1/24, 10:00`. Uses the host's local timezone.
pub fn entry_stamp(t: SystemTime) -> String {
    stamp(&DateTime::<Local>::from(t))
}

/// Today's date as `YYYY-MM-DD`, for the export filename.
pub fn export_date() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn stamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%-d/%-m/%y, %H:%M").to_string()
}
