//! Patrol error taxonomy

use chrono::{DateTime, Local, NaiveDate};
use ronda_api::{ErrorCode, ErrorDetail, ErrorInfo, ParticipantStatus};
use ronda_ledger::LedgerError;
use ronda_store::StoreError;
use ronda_util::{ScheduleId, WallClock};
use thiserror::Error;

/// Failures of patrol operations.
///
/// Everything except `Store` and `Ledger` is detected before any write.
#[derive(Debug, Error)]
pub enum PatrolError {
    #[error(
        "Schedule '{shift_label}' overlaps active schedule {existing} ({start_date} to {end_date})"
    )]
    ScheduleConflict {
        existing: ScheduleId,
        shift_label: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("Schedule {schedule_id} is closed")]
    ScheduleClosed { schedule_id: ScheduleId },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid QR token")]
    InvalidToken,

    #[error("QR token expired at {expired_at}")]
    TokenExpired { expired_at: DateTime<Local> },

    #[error("Resource belongs to another unit")]
    CrossUnitAccess,

    #[error("Outside geofence: {distance_meters} m from post, radius is {radius_meters} m")]
    OutsideGeofence {
        distance_meters: u64,
        radius_meters: u32,
    },

    #[error("No active duty today")]
    NoActiveDutyToday,

    #[error("Outside shift window {start}-{end}")]
    OutsideShiftWindow { start: WallClock, end: WallClock },

    #[error("Already checked in")]
    AlreadyPresent,

    #[error("Fine already paid")]
    AlreadyPaid,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Illegal transition from {from} on {event}")]
    IllegalTransition {
        from: ParticipantStatus,
        event: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type PatrolResult<T> = Result<T, PatrolError>;

impl PatrolError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        PatrolError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PatrolError::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PatrolError::ScheduleConflict { .. } => ErrorCode::ScheduleConflict,
            PatrolError::ScheduleClosed { .. } => ErrorCode::ScheduleClosed,
            PatrolError::NotFound { .. } => ErrorCode::NotFound,
            PatrolError::InvalidToken => ErrorCode::InvalidToken,
            PatrolError::TokenExpired { .. } => ErrorCode::TokenExpired,
            PatrolError::CrossUnitAccess => ErrorCode::CrossUnitAccess,
            PatrolError::OutsideGeofence { .. } => ErrorCode::OutsideGeofence,
            PatrolError::NoActiveDutyToday => ErrorCode::NoActiveDutyToday,
            PatrolError::OutsideShiftWindow { .. } => ErrorCode::OutsideShiftWindow,
            PatrolError::AlreadyPresent => ErrorCode::AlreadyPresent,
            PatrolError::AlreadyPaid => ErrorCode::AlreadyPaid,
            PatrolError::Validation(_) | PatrolError::IllegalTransition { .. } => {
                ErrorCode::InvalidRequest
            }
            PatrolError::Store(_) => ErrorCode::InternalError,
            PatrolError::Ledger(_) => ErrorCode::LedgerError,
        }
    }

    /// Measured values a client needs to render the failure
    pub fn detail(&self) -> Option<ErrorDetail> {
        match self {
            PatrolError::ScheduleConflict {
                existing,
                start_date,
                end_date,
                ..
            } => Some(ErrorDetail::Conflict {
                schedule_id: *existing,
                start_date: *start_date,
                end_date: *end_date,
            }),
            PatrolError::TokenExpired { expired_at } => Some(ErrorDetail::TokenExpiry {
                expired_at: *expired_at,
            }),
            PatrolError::OutsideGeofence {
                distance_meters,
                radius_meters,
            } => Some(ErrorDetail::Geofence {
                distance_meters: *distance_meters,
                radius_meters: *radius_meters,
            }),
            PatrolError::OutsideShiftWindow { start, end } => Some(ErrorDetail::ShiftWindow {
                start_time: *start,
                end_time: *end,
            }),
            _ => None,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.code(), self.to_string());
        match self.detail() {
            Some(detail) => info.with_detail(detail),
            None => info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geofence_error_carries_distance() {
        let err = PatrolError::OutsideGeofence {
            distance_meters: 73,
            radius_meters: 50,
        };
        let info = err.to_error_info();
        assert_eq!(info.code, ErrorCode::OutsideGeofence);
        assert!(info.message.contains("73 m"));
        assert_eq!(
            info.detail,
            Some(ErrorDetail::Geofence {
                distance_meters: 73,
                radius_meters: 50
            })
        );
    }

    #[test]
    fn window_error_carries_bounds() {
        let err = PatrolError::OutsideShiftWindow {
            start: WallClock::new(22, 0).unwrap(),
            end: WallClock::new(4, 0).unwrap(),
        };
        assert_eq!(err.to_string(), "Outside shift window 22:00-04:00");
        assert!(matches!(
            err.detail(),
            Some(ErrorDetail::ShiftWindow { .. })
        ));
    }

    #[test]
    fn closed_schedule_has_its_own_code() {
        let schedule_id = ScheduleId::new();
        let info = PatrolError::ScheduleClosed { schedule_id }.to_error_info();
        assert_eq!(info.code, ErrorCode::ScheduleClosed);
        assert!(info.message.contains(&schedule_id.to_string()));
    }

    #[test]
    fn internal_errors_have_no_detail() {
        let err = PatrolError::Store(StoreError::Database("disk full".into()));
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(err.detail().is_none());
    }
}
