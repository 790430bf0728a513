//! Shared types for the ronda API

use chrono::{DateTime, Duration, Local, NaiveDate};
use ronda_util::{
    Coordinates, FineId, LocationId, ScheduleId, ShiftWindow, UnitId, UserId, WallClock,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A stored or user-supplied enum value that is not part of the closed set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Length of a duty roster cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleType {
    Daily,
    Weekly,
}

impl CycleType {
    /// Last covered date of a cycle beginning on `start_date`
    pub fn end_date(&self, start_date: NaiveDate) -> NaiveDate {
        match self {
            CycleType::Daily => start_date,
            CycleType::Weekly => start_date + Duration::days(6),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleType::Daily => "DAILY",
            CycleType::Weekly => "WEEKLY",
        }
    }
}

impl FromStr for CycleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DAILY" => Ok(CycleType::Daily),
            "WEEKLY" => Ok(CycleType::Weekly),
            _ => Err(UnknownVariant {
                kind: "cycle type",
                value: s.to_string(),
            }),
        }
    }
}

/// Whether a schedule still accepts attendance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Active,
    Inactive,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "ACTIVE",
            ScheduleStatus::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(ScheduleStatus::Active),
            "INACTIVE" => Ok(ScheduleStatus::Inactive),
            _ => Err(UnknownVariant {
                kind: "schedule status",
                value: s.to_string(),
            }),
        }
    }
}

/// Attendance state of one participant in one schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    Pending,
    Present,
    Absent,
    Excused,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Pending => "PENDING",
            ParticipantStatus::Present => "PRESENT",
            ParticipantStatus::Absent => "ABSENT",
            ParticipantStatus::Excused => "EXCUSED",
        }
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ParticipantStatus::Pending),
            "PRESENT" => Ok(ParticipantStatus::Present),
            "ABSENT" => Ok(ParticipantStatus::Absent),
            "EXCUSED" => Ok(ParticipantStatus::Excused),
            _ => Err(UnknownVariant {
                kind: "participant status",
                value: s.to_string(),
            }),
        }
    }
}

/// How an attendance was proven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceMethod {
    Qr,
}

/// Kind of fine a unit can configure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FineType {
    Absent,
    Late,
    EarlyLeave,
}

impl FineType {
    pub const ALL: [FineType; 3] = [FineType::Absent, FineType::Late, FineType::EarlyLeave];

    pub fn as_str(&self) -> &'static str {
        match self {
            FineType::Absent => "ABSENT",
            FineType::Late => "LATE",
            FineType::EarlyLeave => "EARLY_LEAVE",
        }
    }
}

impl fmt::Display for FineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FineType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "ABSENT" => Ok(FineType::Absent),
            "LATE" => Ok(FineType::Late),
            "EARLY_LEAVE" => Ok(FineType::EarlyLeave),
            _ => Err(UnknownVariant {
                kind: "fine type",
                value: s.to_string(),
            }),
        }
    }
}

/// Payment state of a fine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FineStatus {
    Unpaid,
    Paid,
}

impl FineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FineStatus::Unpaid => "UNPAID",
            FineStatus::Paid => "PAID",
        }
    }
}

impl FromStr for FineStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UNPAID" => Ok(FineStatus::Unpaid),
            "PAID" => Ok(FineStatus::Paid),
            _ => Err(UnknownVariant {
                kind: "fine status",
                value: s.to_string(),
            }),
        }
    }
}

/// The authenticated caller, supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub unit_id: UnitId,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, unit_id: impl Into<UnitId>) -> Self {
        Self {
            user_id: user_id.into(),
            unit_id: unit_id.into(),
        }
    }
}

/// One duty roster cycle for one residential unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutySchedule {
    pub id: ScheduleId,
    pub unit_id: UnitId,
    pub cycle_type: CycleType,
    pub shift_label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: WallClock,
    pub end_time: WallClock,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl DutySchedule {
    pub fn window(&self) -> ShiftWindow {
        ShiftWindow::new(self.start_time, self.end_time)
    }

    /// `start_date <= date <= end_date`
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Inclusive date-range intersection
    pub fn overlaps(&self, start_date: NaiveDate, end_date: NaiveDate) -> bool {
        self.start_date <= end_date && start_date <= self.end_date
    }

    /// Status as seen on `today`: an active schedule whose last day has passed reads as inactive
    pub fn effective_status(&self, today: NaiveDate) -> ScheduleStatus {
        match self.status {
            ScheduleStatus::Active if self.end_date < today => ScheduleStatus::Inactive,
            status => status,
        }
    }
}

/// Where and how a check-in scan happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceLocation {
    pub location_id: LocationId,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub method: AttendanceMethod,
}

/// One resident's membership in one duty schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub schedule_id: ScheduleId,
    pub user_id: UserId,
    pub status: ParticipantStatus,
    pub attendance_at: Option<DateTime<Local>>,
    pub clock_out_at: Option<DateTime<Local>>,
    pub attendance_location: Option<AttendanceLocation>,
    pub notes: Option<String>,
    pub is_fined: bool,
    pub fine_amount: Decimal,
}

impl Participant {
    /// Fresh roster membership
    pub fn pending(schedule_id: ScheduleId, user_id: UserId) -> Self {
        Self {
            schedule_id,
            user_id,
            status: ParticipantStatus::Pending,
            attendance_at: None,
            clock_out_at: None,
            attendance_location: None,
            notes: None,
            is_fined: false,
            fine_amount: Decimal::ZERO,
        }
    }

    pub fn clear_fine(&mut self) {
        self.is_fined = false;
        self.fine_amount = Decimal::ZERO;
    }
}

/// Smallest accepted geofence radius
pub const MIN_RADIUS_METERS: u32 = 5;

/// Largest accepted geofence radius
pub const MAX_RADIUS_METERS: u32 = 500;

/// Radius used when a post is created without one
pub const DEFAULT_RADIUS_METERS: u32 = 50;

/// A physical checkpoint for attendance scanning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostLocation {
    pub id: LocationId,
    pub unit_id: UnitId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: u32,
    pub qr_token: String,
    /// None means the token never expires
    pub token_expires_at: Option<DateTime<Local>>,
    pub created_at: DateTime<Local>,
}

impl PostLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn token_expired(&self, now: DateTime<Local>) -> bool {
        matches!(self.token_expires_at, Some(expires_at) if now > expires_at)
    }
}

/// Per-unit, per-fine-type configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineSetting {
    pub unit_id: UnitId,
    pub fine_type: FineType,
    pub amount: Decimal,
    pub tolerance_minutes: u32,
    pub is_active: bool,
}

/// A generated monetary obligation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineRecord {
    pub id: FineId,
    pub unit_id: UnitId,
    pub user_id: UserId,
    pub schedule_id: ScheduleId,
    pub fine_type: FineType,
    pub amount: Decimal,
    pub status: FineStatus,
    pub generated_at: DateTime<Local>,
    pub paid_at: Option<DateTime<Local>>,
}

/// Input of a schedule creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub cycle_type: CycleType,
    pub shift_label: String,
    pub start_date: NaiveDate,
    pub start_time: WallClock,
    pub end_time: WallClock,
    #[serde(default)]
    pub participant_ids: Vec<UserId>,
}

/// Input of a post creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Falls back to the configured default radius
    #[serde(default)]
    pub radius_meters: Option<u32>,
}

/// Partial update of a schedule.
///
/// `participant_ids`, when present, replaces the whole roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    #[serde(default)]
    pub start_time: Option<WallClock>,
    #[serde(default)]
    pub end_time: Option<WallClock>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
    #[serde(default)]
    pub participant_ids: Option<Vec<UserId>>,
}

/// Partial update of a post location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub radius_meters: Option<u32>,
}

/// One row of a fine-settings upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineSettingInput {
    pub fine_type: FineType,
    pub amount: Decimal,
    #[serde(default)]
    pub tolerance_minutes: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Filter for listing fines within a unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineFilter {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub status: Option<FineStatus>,
}

/// A QR scan submitted from a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub qr_token: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Result of a successful scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    ClockedIn {
        participant: Participant,
        distance_meters: f64,
    },
    ClockedOut {
        participant: Participant,
    },
    /// Third and later scans are accepted but change nothing
    AlreadyClockedOut {
        participant: Participant,
        message: String,
    },
}

impl ScanOutcome {
    pub fn participant(&self) -> &Participant {
        match self {
            ScanOutcome::ClockedIn { participant, .. }
            | ScanOutcome::ClockedOut { participant }
            | ScanOutcome::AlreadyClockedOut { participant, .. } => participant,
        }
    }
}

/// New token issued for a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRotation {
    pub location_id: LocationId,
    pub qr_token: String,
    pub token_expires_at: Option<DateTime<Local>>,
}

/// Outcome of closing a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseSummary {
    pub schedule_id: ScheduleId,
    pub absent_count: usize,
    pub fines: Vec<FineRecord>,
}
