//! Command types for the ronda request/response boundary

use chrono::{DateTime, Local, NaiveDate};
use ronda_util::{FineId, LocationId, ScheduleId, UserId, WallClock};
use serde::{Deserialize, Serialize};

use crate::{
    CloseSummary, DutySchedule, FineFilter, FineRecord, FineSetting, FineSettingInput, Identity,
    LocationUpdate, NewLocation, NewSchedule, Participant, ParticipantStatus, PostLocation,
    ScanOutcome, ScanRequest, ScheduleUpdate, TokenRotation, API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Caller, as asserted by the identity provider
    pub identity: Identity,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, identity: Identity, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            identity,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, ResponseResult::Ok(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    /// Measured values behind the failure, when there are any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ErrorDetail>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    ScheduleConflict,
    ScheduleClosed,
    NotFound,
    InvalidToken,
    TokenExpired,
    CrossUnitAccess,
    OutsideGeofence,
    NoActiveDutyToday,
    OutsideShiftWindow,
    AlreadyPresent,
    AlreadyPaid,
    LedgerError,
    InternalError,
}

/// Structured values that let a client render an actionable message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetail {
    Conflict {
        schedule_id: ScheduleId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Geofence {
        distance_meters: u64,
        radius_meters: u32,
    },
    ShiftWindow {
        start_time: WallClock,
        end_time: WallClock,
    },
    TokenExpiry {
        expired_at: DateTime<Local>,
    },
}

/// All operations of the patrol core.
///
/// The unit is always taken from the request identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // Duty schedules
    CreateSchedule(NewSchedule),
    CloneLatestSchedule {
        new_start_date: NaiveDate,
    },
    UpdateSchedule {
        schedule_id: ScheduleId,
        update: ScheduleUpdate,
    },
    DeleteSchedule {
        schedule_id: ScheduleId,
    },
    GetSchedule {
        schedule_id: ScheduleId,
    },
    ListSchedules,
    CloseSchedule {
        schedule_id: ScheduleId,
    },

    // Roster
    AddParticipants {
        schedule_id: ScheduleId,
        user_ids: Vec<UserId>,
    },
    RemoveParticipant {
        schedule_id: ScheduleId,
        user_id: UserId,
    },
    ListParticipants {
        schedule_id: ScheduleId,
    },
    OverrideParticipant {
        schedule_id: ScheduleId,
        user_id: UserId,
        status: ParticipantStatus,
        #[serde(default)]
        notes: Option<String>,
    },

    // Post locations
    CreateLocation(NewLocation),
    RotateToken {
        location_id: LocationId,
    },
    UpdateLocation {
        location_id: LocationId,
        update: LocationUpdate,
    },
    DeleteLocation {
        location_id: LocationId,
    },
    ListLocations,

    // Attendance
    Scan(ScanRequest),
    SubmitExcuse {
        notes: String,
    },
    AttendanceHistory,

    // Fines
    UpsertFineSettings {
        settings: Vec<FineSettingInput>,
    },
    ListFineSettings,
    ListFines {
        #[serde(default)]
        filter: FineFilter,
    },
    MarkFinePaid {
        fine_id: FineId,
    },
    GenerateFines {
        schedule_id: ScheduleId,
    },
}

/// Successful response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Schedule(DutySchedule),
    ScheduleDetail {
        schedule: DutySchedule,
        participants: Vec<Participant>,
    },
    Schedules {
        schedules: Vec<DutySchedule>,
    },
    Participant(Participant),
    Participants {
        participants: Vec<Participant>,
    },
    Location(PostLocation),
    Locations {
        locations: Vec<PostLocation>,
    },
    TokenRotated(TokenRotation),
    Scan(ScanOutcome),
    Closed(CloseSummary),
    FineSettings {
        settings: Vec<FineSetting>,
    },
    Fines {
        fines: Vec<FineRecord>,
    },
    Fine(FineRecord),
    Deleted {
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_through_json() {
        let json = r#"{
            "type": "create_schedule",
            "cycle_type": "WEEKLY",
            "shift_label": "Night Shift",
            "start_date": "2024-01-01",
            "start_time": "22:00",
            "end_time": "04:00",
            "participant_ids": ["alice", "bob"]
        }"#;

        let cmd: Command = serde_json::from_str(json).unwrap();
        match cmd {
            Command::CreateSchedule(new) => {
                assert_eq!(new.cycle_type, crate::CycleType::Weekly);
                assert_eq!(new.start_time, WallClock::new(22, 0).unwrap());
                assert_eq!(new.participant_ids.len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn create_location_radius_is_optional() {
        let json = r#"{"type":"create_location","name":"Gate","latitude":-6.2,"longitude":106.8}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, Command::CreateLocation(NewLocation { radius_meters: None, .. })));
    }

    #[test]
    fn scan_command_is_flat() {
        let json = r#"{"type":"scan","qr_token":"abc","latitude":-6.2,"longitude":106.8}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, Command::Scan(ScanRequest { ref qr_token, .. }) if qr_token == "abc"));
    }

    #[test]
    fn error_detail_is_omitted_when_absent() {
        let resp = Response::error(7, ErrorInfo::new(ErrorCode::NotFound, "Schedule not found"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("detail"));
        assert!(json.contains("not_found"));
    }

    #[test]
    fn geofence_detail_serializes() {
        let info = ErrorInfo::new(ErrorCode::OutsideGeofence, "Too far").with_detail(
            ErrorDetail::Geofence {
                distance_meters: 120,
                radius_meters: 50,
            },
        );
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["detail"]["type"], "geofence");
        assert_eq!(json["detail"]["distance_meters"], 120);
    }
}
