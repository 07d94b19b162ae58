use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Live status of a child. Drives what the next scan does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildStatus {
    Absent,
    Present,
    PickedUp,
    PickupRequested,
}

impl ChildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildStatus::Absent => "ABSENT",
            ChildStatus::Present => "PRESENT",
            ChildStatus::PickedUp => "PICKED_UP",
            ChildStatus::PickupRequested => "PICKUP_REQUESTED",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "ABSENT" => Some(ChildStatus::Absent),
            "PRESENT" => Some(ChildStatus::Present),
            "PICKED_UP" => Some(ChildStatus::PickedUp),
            "PICKUP_REQUESTED" => Some(ChildStatus::PickupRequested),
            _ => None,
        }
    }

    /// Human wording used in guardian-facing rejection messages.
    pub fn describe(&self) -> &'static str {
        match self {
            ChildStatus::Absent => "absent",
            ChildStatus::Present => "present",
            ChildStatus::PickedUp => "picked up",
            ChildStatus::PickupRequested => "awaiting pickup",
        }
    }
}

/// Direction of a committed scan. Doubles as the notification kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanAction {
    CheckIn,
    PickUp,
}

impl ScanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::CheckIn => "CHECK_IN",
            ScanAction::PickUp => "PICK_UP",
        }
    }

    pub fn parse_action(s: &str) -> Option<Self> {
        match s {
            "CHECK_IN" => Some(ScanAction::CheckIn),
            "PICK_UP" => Some(ScanAction::PickUp),
            _ => None,
        }
    }
}

/// Lifecycle status of an attendance record, distinct from the child's live
/// status: a record turns ABSENT once the child has been picked up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "PRESENT" => Some(AttendanceStatus::Present),
            "ABSENT" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardian {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
    pub id: i64,
    pub guardian_id: i64,
    pub name: String,
    pub status: ChildStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub child_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: ScanAction,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub child_id: i64,
    pub guardian_id: i64,
}
