use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Excused,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Excused => "EXCUSED",
            AttendanceStatus::Late => "LATE",
        }
    }

    /// LATE counts toward the attendance rate; it is tracked separately in the totals.
    pub fn counts_as_attended(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PRESENT" => Ok(AttendanceStatus::Present),
            "ABSENT" => Ok(AttendanceStatus::Absent),
            "EXCUSED" => Ok(AttendanceStatus::Excused),
            "LATE" => Ok(AttendanceStatus::Late),
            other => Err(EngineError::InvalidAttendanceStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        }
    }
}

impl std::str::FromStr for TrendDirection {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "improving" => Ok(TrendDirection::Improving),
            "declining" => Ok(TrendDirection::Declining),
            "stable" => Ok(TrendDirection::Stable),
            other => Err(EngineError::InvalidTrendDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionCategory {
    ConsecutiveAbsences,
    LowAttendanceRate,
    DecliningTrend,
    FirstTimeAbsence,
    LongTermAbsent,
}

impl SuggestionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionCategory::ConsecutiveAbsences => "CONSECUTIVE_ABSENCES",
            SuggestionCategory::LowAttendanceRate => "LOW_ATTENDANCE_RATE",
            SuggestionCategory::DecliningTrend => "DECLINING_TREND",
            SuggestionCategory::FirstTimeAbsence => "FIRST_TIME_ABSENCE",
            SuggestionCategory::LongTermAbsent => "LONG_TERM_ABSENT",
        }
    }
}

impl std::str::FromStr for SuggestionCategory {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CONSECUTIVE_ABSENCES" => Ok(SuggestionCategory::ConsecutiveAbsences),
            "LOW_ATTENDANCE_RATE" => Ok(SuggestionCategory::LowAttendanceRate),
            "DECLINING_TREND" => Ok(SuggestionCategory::DecliningTrend),
            "FIRST_TIME_ABSENCE" => Ok(SuggestionCategory::FirstTimeAbsence),
            "LONG_TERM_ABSENT" => Ok(SuggestionCategory::LongTermAbsent),
            other => Err(EngineError::InvalidCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl SuggestionPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionPriority::Low => "LOW",
            SuggestionPriority::Medium => "MEDIUM",
            SuggestionPriority::High => "HIGH",
            SuggestionPriority::Urgent => "URGENT",
        }
    }
}

impl std::str::FromStr for SuggestionPriority {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "LOW" => Ok(SuggestionPriority::Low),
            "MEDIUM" => Ok(SuggestionPriority::Medium),
            "HIGH" => Ok(SuggestionPriority::High),
            "URGENT" => Ok(SuggestionPriority::Urgent),
            other => Err(EngineError::InvalidPriority(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionStatus {
    Pending,
    InProgress,
    Contacted,
    Resolved,
    Dismissed,
}

impl SuggestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "PENDING",
            SuggestionStatus::InProgress => "IN_PROGRESS",
            SuggestionStatus::Contacted => "CONTACTED",
            SuggestionStatus::Resolved => "RESOLVED",
            SuggestionStatus::Dismissed => "DISMISSED",
        }
    }

    /// An open suggestion blocks re-creation of the same category for its pair.
    pub fn is_open(self) -> bool {
        matches!(self, SuggestionStatus::Pending | SuggestionStatus::InProgress)
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(SuggestionStatus::Pending),
            "IN_PROGRESS" => Ok(SuggestionStatus::InProgress),
            "CONTACTED" => Ok(SuggestionStatus::Contacted),
            "RESOLVED" => Ok(SuggestionStatus::Resolved),
            "DISMISSED" => Ok(SuggestionStatus::Dismissed),
            other => Err(EngineError::InvalidSuggestionStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub group_id: Uuid,
    pub participant_id: Uuid,
    pub class_date: NaiveDate,
    pub status: AttendanceStatus,
    pub note: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttendancePattern {
    pub group_id: Uuid,
    pub participant_id: Uuid,
    pub total_classes_held: i64,
    pub total_present: i64,
    pub total_absent: i64,
    pub total_excused: i64,
    pub total_late: i64,
    pub attendance_rate: f64,
    pub consecutive_absences: i64,
    pub consecutive_presences: i64,
    pub last_attendance_date: Option<NaiveDate>,
    pub last_attendance_status: Option<AttendanceStatus>,
    pub last_4_weeks_rate: f64,
    pub last_8_weeks_rate: f64,
    pub trend_direction: TrendDirection,
    pub last_calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FollowUpSuggestion {
    pub id: Uuid,
    pub group_id: Uuid,
    pub participant_id: Uuid,
    pub category: SuggestionCategory,
    pub priority: SuggestionPriority,
    pub title: String,
    pub description: String,
    pub suggested_action: String,
    pub trigger_reason: String,
    pub trigger_data: serde_json::Value,
    pub due_date: NaiveDate,
    pub status: SuggestionStatus,
    pub assigned_to: Option<Uuid>,
    pub contact_method: Option<String>,
    pub contact_notes: Option<String>,
    pub contacted_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub outcome: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for a single attendance write.
#[derive(Debug, Clone)]
pub struct RecordAttendance {
    pub group_id: Uuid,
    pub participant_id: Uuid,
    pub class_date: NaiveDate,
    pub status: AttendanceStatus,
    pub note: Option<String>,
    pub recorded_by: Option<Uuid>,
}

/// One row of a bulk attendance sheet. The status stays raw so a bad value
/// fails that entry alone, not the whole batch.
#[derive(Debug, Clone)]
pub struct BulkEntry {
    pub participant_id: Uuid,
    pub status: String,
    pub note: Option<String>,
}

/// A triggered rule's output, not yet persisted.
#[derive(Debug, Clone)]
pub struct SuggestionDraft {
    pub category: SuggestionCategory,
    pub priority: SuggestionPriority,
    pub title: String,
    pub description: String,
    pub suggested_action: String,
    pub trigger_reason: String,
    pub trigger_data: serde_json::Value,
    pub due_date: NaiveDate,
}

/// Leader-driven changes to a follow-up suggestion. Absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct FollowUpPatch {
    pub status: Option<SuggestionStatus>,
    pub assigned_to: Option<Uuid>,
    pub contact_method: Option<String>,
    pub contact_notes: Option<String>,
    pub resolution: Option<String>,
    pub outcome: Option<String>,
}
