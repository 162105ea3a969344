use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registry entry. `registration_number` is stored normalized (digits only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub registration_number: String,
    pub name: String,
    pub last_seen_at: Option<NaiveDateTime>,
    pub member_type: String,
}

/// A scheduled meeting or training session. Times are kept as "HH:MM".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub campus: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckInAttempt {
    pub meeting_id: Uuid,
    /// Raw registration number as typed or scanned.
    pub registration_number: String,
    /// Name supplied for a member the registry doesn't know yet.
    pub name_override: Option<String>,
    /// Set when the operator already confirmed a same-week repeat check-in.
    pub confirmed_duplicate: bool,
}

impl CheckInAttempt {
    pub fn new(meeting_id: Uuid, registration_number: impl Into<String>) -> Self {
        Self {
            meeting_id,
            registration_number: registration_number.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed_duplicate = true;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub meeting_date: NaiveDate,
    pub campus: String,
    pub registration_number: String,
    pub name: String,
    pub checked_in_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct MeetingSummary {
    pub meeting_id: Uuid,
    pub meeting_date: NaiveDate,
    pub campus: String,
    pub headcount: usize,
}

#[derive(Debug, Clone)]
pub struct WeeklyTotal {
    pub week_start: NaiveDate,
    pub check_ins: usize,
    pub unique_members: usize,
}
