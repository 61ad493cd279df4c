//! Time entry documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding clock events.
pub const ENTRIES_COLLECTION: &str = "time_clock_entries";

/// Collection holding install/uninstall audit records.
pub const AUDIT_COLLECTION: &str = "time_clock_audit";

/// Kind of clock event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Start of a shift.
    ClockIn,
    /// End of a shift.
    ClockOut,
}

/// A stored clock event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    /// Technician.
    pub user_id: String,
    /// Event kind.
    pub kind: EntryKind,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Ticket worked on, if any.
    #[serde(default)]
    pub ticket_id: Option<String>,
    /// Free-text note.
    #[serde(default)]
    pub note: Option<String>,
    /// Worked minutes, on clock-out only.
    #[serde(default)]
    pub minutes: Option<i64>,
}

/// Body of `POST /clock-in`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockInRequest {
    /// Technician.
    pub user_id: String,
    /// Ticket worked on.
    #[serde(default)]
    pub ticket_id: Option<String>,
    /// Free-text note.
    #[serde(default)]
    pub note: Option<String>,
}

/// Body of `POST /clock-out`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockOutRequest {
    /// Technician.
    pub user_id: String,
    /// Free-text note.
    #[serde(default)]
    pub note: Option<String>,
}
