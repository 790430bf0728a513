//! Audit event types

use chrono::{DateTime, Local, NaiveDate};
use ronda_api::{FineType, ParticipantStatus};
use ronda_util::{FineId, LocationId, ScheduleId, UnitId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    ScheduleCreated {
        schedule_id: ScheduleId,
        shift_label: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        participant_count: usize,
    },

    /// Created by copying the most recent schedule
    ScheduleCloned {
        schedule_id: ScheduleId,
        source_id: ScheduleId,
    },

    ScheduleUpdated {
        schedule_id: ScheduleId,
        roster_replaced: bool,
    },

    ScheduleDeleted {
        schedule_id: ScheduleId,
        participant_count: usize,
    },

    ScheduleClosed {
        schedule_id: ScheduleId,
        absent_count: usize,
        fined_count: usize,
    },

    ParticipantsAdded {
        schedule_id: ScheduleId,
        user_ids: Vec<UserId>,
    },

    ParticipantRemoved {
        schedule_id: ScheduleId,
        user_id: UserId,
    },

    /// Administrative status change
    ParticipantOverridden {
        schedule_id: ScheduleId,
        user_id: UserId,
        from: ParticipantStatus,
        to: ParticipantStatus,
    },

    LocationCreated {
        location_id: LocationId,
        name: String,
    },

    /// Token values are secrets and are never logged
    TokenRotated {
        location_id: LocationId,
        expires_at: Option<DateTime<Local>>,
    },

    LocationUpdated {
        location_id: LocationId,
    },

    LocationDeleted {
        location_id: LocationId,
    },

    ClockedIn {
        schedule_id: ScheduleId,
        user_id: UserId,
        location_id: LocationId,
        distance_meters: f64,
    },

    ClockedOut {
        schedule_id: ScheduleId,
        user_id: UserId,
    },

    ExcuseSubmitted {
        schedule_id: ScheduleId,
        user_id: UserId,
    },

    FineGenerated {
        fine_id: FineId,
        schedule_id: ScheduleId,
        user_id: UserId,
        fine_type: FineType,
        amount: Decimal,
    },

    FinePaid {
        fine_id: FineId,
        amount: Decimal,
    },

    FineSettingsUpdated {
        fine_types: Vec<FineType>,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Unit the event belongs to
    pub unit_id: UnitId,

    /// Who triggered it
    pub actor: UserId,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(
        timestamp: DateTime<Local>,
        unit_id: UnitId,
        actor: UserId,
        event: AuditEventType,
    ) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp,
            unit_id,
            actor,
            event,
        }
    }
}
