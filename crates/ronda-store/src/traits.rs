//! Store trait definitions
//!
//! Repositories are implemented by a [`StoreTx`]: every core operation opens
//! one transaction, performs all of its reads and writes through it, and
//! commits. Dropping a transaction without committing discards its writes.

use chrono::{DateTime, Local, NaiveDate};
use ronda_api::{
    DutySchedule, FineFilter, FineRecord, FineSetting, FineType, Participant, PostLocation,
};
use ronda_util::{FineId, LocationId, ScheduleId, UnitId, UserId};

use crate::{AuditEvent, StoreResult};

pub trait ScheduleRepository {
    fn insert_schedule(&self, schedule: &DutySchedule) -> StoreResult<()>;

    fn get_schedule(&self, id: ScheduleId) -> StoreResult<Option<DutySchedule>>;

    fn update_schedule(&self, schedule: &DutySchedule) -> StoreResult<()>;

    /// Returns false if no such schedule existed
    fn delete_schedule(&self, id: ScheduleId) -> StoreResult<bool>;

    /// All schedules of a unit, most recently started first
    fn list_schedules(&self, unit_id: &UnitId) -> StoreResult<Vec<DutySchedule>>;

    /// Most recently started schedule of a unit, regardless of status
    fn latest_schedule(&self, unit_id: &UnitId) -> StoreResult<Option<DutySchedule>>;

    /// An ACTIVE schedule with this label whose dates intersect `[start, end]`
    fn find_overlapping_active(
        &self,
        unit_id: &UnitId,
        shift_label: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        exclude: Option<ScheduleId>,
    ) -> StoreResult<Option<DutySchedule>>;

    /// Flip ACTIVE schedules whose `end_date` is before `today` to INACTIVE.
    /// Returns how many rows changed.
    fn deactivate_ended(
        &self,
        unit_id: &UnitId,
        today: NaiveDate,
        now: DateTime<Local>,
    ) -> StoreResult<usize>;

    /// ACTIVE schedule covering `today` in which `user_id` is a participant
    fn find_active_for_user(
        &self,
        unit_id: &UnitId,
        user_id: &UserId,
        today: NaiveDate,
    ) -> StoreResult<Option<DutySchedule>>;
}

pub trait ParticipantRepository {
    fn insert_participant(&self, participant: &Participant) -> StoreResult<()>;

    fn get_participant(
        &self,
        schedule_id: ScheduleId,
        user_id: &UserId,
    ) -> StoreResult<Option<Participant>>;

    fn update_participant(&self, participant: &Participant) -> StoreResult<()>;

    /// Returns false if the user was not on the roster
    fn delete_participant(&self, schedule_id: ScheduleId, user_id: &UserId) -> StoreResult<bool>;

    /// Remove the whole roster of a schedule
    fn delete_participants(&self, schedule_id: ScheduleId) -> StoreResult<usize>;

    fn list_participants(&self, schedule_id: ScheduleId) -> StoreResult<Vec<Participant>>;

    /// Every roster membership of a user, most recent schedule first
    fn participant_history(&self, user_id: &UserId) -> StoreResult<Vec<Participant>>;
}

pub trait LocationRepository {
    fn insert_location(&self, location: &PostLocation) -> StoreResult<()>;

    fn get_location(&self, id: LocationId) -> StoreResult<Option<PostLocation>>;

    fn find_location_by_token(&self, qr_token: &str) -> StoreResult<Option<PostLocation>>;

    fn update_location(&self, location: &PostLocation) -> StoreResult<()>;

    fn delete_location(&self, id: LocationId) -> StoreResult<bool>;

    fn list_locations(&self, unit_id: &UnitId) -> StoreResult<Vec<PostLocation>>;
}

pub trait FineRepository {
    fn get_fine_setting(
        &self,
        unit_id: &UnitId,
        fine_type: FineType,
    ) -> StoreResult<Option<FineSetting>>;

    /// Insert or replace the setting keyed by `(unit_id, fine_type)`
    fn upsert_fine_setting(&self, setting: &FineSetting) -> StoreResult<()>;

    fn list_fine_settings(&self, unit_id: &UnitId) -> StoreResult<Vec<FineSetting>>;

    fn insert_fine(&self, fine: &FineRecord) -> StoreResult<()>;

    fn get_fine(&self, id: FineId) -> StoreResult<Option<FineRecord>>;

    fn update_fine(&self, fine: &FineRecord) -> StoreResult<()>;

    /// Fines of a unit, newest first
    fn list_fines(&self, unit_id: &UnitId, filter: &FineFilter) -> StoreResult<Vec<FineRecord>>;
}

/// One unit of work against the store
pub trait StoreTx:
    ScheduleRepository + ParticipantRepository + LocationRepository + FineRepository
{
    /// Append an audit event as part of this transaction
    fn append_audit(&self, event: &AuditEvent) -> StoreResult<i64>;

    /// Make every write of this transaction durable
    fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Main store trait
pub trait Store: Send + Sync {
    /// Start a transaction. Only one transaction is open at a time.
    fn begin(&self) -> StoreResult<Box<dyn StoreTx + '_>>;

    /// Recent audit events of a unit, newest first
    fn get_recent_audits(&self, unit_id: &UnitId, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
