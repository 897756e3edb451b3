//! Visit records and per-visit choices.
//!
//! # Invariants
//! - `visit_number` is 1-based and contiguous per identity.
//! - Date/time columns are always derived from `visited_at`.

use super::timestamp::{format_date, format_time, Timestamp};
use serde::{Deserialize, Serialize};

/// Contact consent answer captured at the kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentChoice {
    Yes,
    No,
}

impl ConsentChoice {
    /// Stable flat-file label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }

    /// Parses a stored label. Unknown labels are absent.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Yes" | "yes" => Some(Self::Yes),
            "No" | "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// Who filled in the form for the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnteredBy {
    Participant,
    Guardian,
}

impl EnteredBy {
    /// Stable flat-file label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Participant => "participant",
            Self::Guardian => "guardian",
        }
    }

    /// Parses a stored label. Unknown labels are absent.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "participant" => Some(Self::Participant),
            "guardian" => Some(Self::Guardian),
            _ => None,
        }
    }
}

/// One check-in event for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    /// 1-based sequence number within the identity.
    pub visit_number: u32,
    pub visited_at: Timestamp,
    /// Assigned by staff, possibly after the form was completed.
    pub study_code: Option<String>,
    pub consent: Option<ConsentChoice>,
    pub entered_by: Option<EnteredBy>,
}

impl Visit {
    /// `YYYY-MM-DD` part of the visit timestamp.
    pub fn visit_date(&self) -> String {
        format_date(self.visited_at)
    }

    /// `HH:MM:SS` part of the visit timestamp.
    pub fn visit_time(&self) -> String {
        format_time(self.visited_at)
    }
}
