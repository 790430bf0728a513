//! Duty schedule lifecycle

use chrono::NaiveDate;
use ronda_api::{
    DutySchedule, Identity, NewSchedule, Participant, ScheduleStatus, ScheduleUpdate,
};
use ronda_store::{AuditEventType, StoreTx};
use ronda_util::{format_date, ScheduleId, UnitId};
use tracing::{debug, info};

use crate::service::{ensure_same_unit, unique_users};
use crate::{PatrolError, PatrolResult, PatrolService};

/// Label for a schedule copied onto `new_start`.
///
/// A label that embeds its own start date (`YYYY-MM-DD`) gets the new date;
/// any other label is reused as is.
pub fn clone_label(label: &str, old_start: NaiveDate, new_start: NaiveDate) -> String {
    let old = format_date(old_start);
    if label.contains(&old) {
        label.replace(&old, &format_date(new_start))
    } else {
        label.to_string()
    }
}

/// Fail if an ACTIVE schedule with the same label overlaps `[start, end]`
pub(crate) fn ensure_no_overlap(
    tx: &dyn StoreTx,
    unit_id: &UnitId,
    shift_label: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    exclude: Option<ScheduleId>,
) -> PatrolResult<()> {
    match tx.find_overlapping_active(unit_id, shift_label, start_date, end_date, exclude)? {
        Some(existing) => Err(PatrolError::ScheduleConflict {
            existing: existing.id,
            shift_label: existing.shift_label,
            start_date: existing.start_date,
            end_date: existing.end_date,
        }),
        None => Ok(()),
    }
}

/// Load a schedule owned by the caller's unit
pub(crate) fn owned_schedule(
    tx: &dyn StoreTx,
    identity: &Identity,
    schedule_id: ScheduleId,
) -> PatrolResult<DutySchedule> {
    let schedule = tx
        .get_schedule(schedule_id)?
        .ok_or_else(|| PatrolError::not_found("schedule", schedule_id))?;
    ensure_same_unit(identity, &schedule.unit_id)?;
    Ok(schedule)
}

/// Fail if `schedule` has been closed. Only reactivation may touch it then.
pub(crate) fn ensure_open(schedule: &DutySchedule) -> PatrolResult<()> {
    match schedule.status {
        ScheduleStatus::Active => Ok(()),
        ScheduleStatus::Inactive => Err(PatrolError::ScheduleClosed {
            schedule_id: schedule.id,
        }),
    }
}

impl PatrolService {
    pub fn create_schedule(
        &self,
        identity: &Identity,
        new: NewSchedule,
    ) -> PatrolResult<DutySchedule> {
        let shift_label = new.shift_label.trim().to_string();
        if shift_label.is_empty() {
            return Err(PatrolError::validation("shift_label cannot be empty"));
        }
        let participant_ids = unique_users(&new.participant_ids)?;

        let now = self.now();
        let unit_id = identity.unit_id.clone();
        let end_date = new.cycle_type.end_date(new.start_date);

        let tx = self.store.begin()?;
        tx.deactivate_ended(&unit_id, now.date_naive(), now)?;
        ensure_no_overlap(&*tx, &unit_id, &shift_label, new.start_date, end_date, None)?;

        let schedule = DutySchedule {
            id: ScheduleId::new(),
            unit_id,
            cycle_type: new.cycle_type,
            shift_label,
            start_date: new.start_date,
            end_date,
            start_time: new.start_time,
            end_time: new.end_time,
            status: ScheduleStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tx.insert_schedule(&schedule)?;
        for user_id in &participant_ids {
            tx.insert_participant(&Participant::pending(schedule.id, user_id.clone()))?;
        }

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ScheduleCreated {
                schedule_id: schedule.id,
                shift_label: schedule.shift_label.clone(),
                start_date: schedule.start_date,
                end_date: schedule.end_date,
                participant_count: participant_ids.len(),
            },
        )?;
        tx.commit()?;

        info!(
            schedule_id = %schedule.id,
            unit_id = %schedule.unit_id,
            label = %schedule.shift_label,
            start_date = %schedule.start_date,
            end_date = %schedule.end_date,
            participants = participant_ids.len(),
            "Schedule created"
        );
        Ok(schedule)
    }

    /// Copy the most recently started schedule of the caller's unit onto a new start date
    pub fn clone_latest(
        &self,
        identity: &Identity,
        new_start_date: NaiveDate,
    ) -> PatrolResult<DutySchedule> {
        let now = self.now();
        let unit_id = identity.unit_id.clone();

        let tx = self.store.begin()?;
        tx.deactivate_ended(&unit_id, now.date_naive(), now)?;

        let source = tx
            .latest_schedule(&unit_id)?
            .ok_or_else(|| PatrolError::not_found("schedule", format!("latest for unit {unit_id}")))?;
        let roster = tx.list_participants(source.id)?;

        let shift_label = clone_label(&source.shift_label, source.start_date, new_start_date);
        let end_date = source.cycle_type.end_date(new_start_date);
        ensure_no_overlap(&*tx, &unit_id, &shift_label, new_start_date, end_date, None)?;

        let schedule = DutySchedule {
            id: ScheduleId::new(),
            unit_id,
            cycle_type: source.cycle_type,
            shift_label,
            start_date: new_start_date,
            end_date,
            start_time: source.start_time,
            end_time: source.end_time,
            status: ScheduleStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tx.insert_schedule(&schedule)?;
        for member in &roster {
            tx.insert_participant(&Participant::pending(schedule.id, member.user_id.clone()))?;
        }

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ScheduleCloned {
                schedule_id: schedule.id,
                source_id: source.id,
            },
        )?;
        tx.commit()?;

        info!(
            schedule_id = %schedule.id,
            source_id = %source.id,
            start_date = %schedule.start_date,
            participants = roster.len(),
            "Schedule cloned"
        );
        Ok(schedule)
    }

    /// Apply a partial update. A supplied `participant_ids` replaces the roster wholesale.
    pub fn update_schedule(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
        update: ScheduleUpdate,
    ) -> PatrolResult<DutySchedule> {
        let replacement = update
            .participant_ids
            .as_deref()
            .map(unique_users)
            .transpose()?;

        let now = self.now();
        let tx = self.store.begin()?;
        tx.deactivate_ended(&identity.unit_id, now.date_naive(), now)?;

        let mut schedule = owned_schedule(&*tx, identity, schedule_id)?;

        // A closed roster is final; times and members stay as they were when it closed
        let reactivating = update.status == Some(ScheduleStatus::Active);
        let reshapes = update.start_time.is_some()
            || update.end_time.is_some()
            || replacement.is_some();
        if reshapes && !reactivating {
            ensure_open(&schedule)?;
        }

        if let Some(start_time) = update.start_time {
            schedule.start_time = start_time;
        }
        if let Some(end_time) = update.end_time {
            schedule.end_time = end_time;
        }
        if let Some(status) = update.status {
            if status == ScheduleStatus::Active && schedule.status == ScheduleStatus::Inactive {
                ensure_no_overlap(
                    &*tx,
                    &schedule.unit_id,
                    &schedule.shift_label,
                    schedule.start_date,
                    schedule.end_date,
                    Some(schedule.id),
                )?;
            }
            schedule.status = status;
        }
        schedule.updated_at = now;
        tx.update_schedule(&schedule)?;

        if let Some(user_ids) = &replacement {
            let removed = tx.delete_participants(schedule.id)?;
            for user_id in user_ids {
                tx.insert_participant(&Participant::pending(schedule.id, user_id.clone()))?;
            }
            debug!(
                schedule_id = %schedule.id,
                removed,
                added = user_ids.len(),
                "Roster replaced"
            );
        }

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ScheduleUpdated {
                schedule_id: schedule.id,
                roster_replaced: replacement.is_some(),
            },
        )?;
        tx.commit()?;

        info!(schedule_id = %schedule.id, status = schedule.status.as_str(), "Schedule updated");
        Ok(schedule)
    }

    /// Remove the roster, then the schedule. Fines already generated are kept.
    pub fn delete_schedule(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
    ) -> PatrolResult<ScheduleId> {
        let now = self.now();
        let tx = self.store.begin()?;
        let schedule = owned_schedule(&*tx, identity, schedule_id)?;

        let participant_count = tx.delete_participants(schedule.id)?;
        tx.delete_schedule(schedule.id)?;

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ScheduleDeleted {
                schedule_id: schedule.id,
                participant_count,
            },
        )?;
        tx.commit()?;

        info!(schedule_id = %schedule.id, participant_count, "Schedule deleted");
        Ok(schedule.id)
    }

    pub fn get_schedule(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
    ) -> PatrolResult<(DutySchedule, Vec<Participant>)> {
        let now = self.now();
        let tx = self.store.begin()?;
        tx.deactivate_ended(&identity.unit_id, now.date_naive(), now)?;

        let schedule = owned_schedule(&*tx, identity, schedule_id)?;
        let participants = tx.list_participants(schedule.id)?;
        tx.commit()?;

        Ok((schedule, participants))
    }

    /// Schedules of the caller's unit, most recently started first
    pub fn list_schedules(&self, identity: &Identity) -> PatrolResult<Vec<DutySchedule>> {
        let now = self.now();
        let tx = self.store.begin()?;
        tx.deactivate_ended(&identity.unit_id, now.date_naive(), now)?;
        let schedules = tx.list_schedules(&identity.unit_id)?;
        tx.commit()?;
        Ok(schedules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{at, harness};
    use ronda_api::CycleType;
    use ronda_util::{UserId, WallClock};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn night(start: NaiveDate, cycle_type: CycleType, users: &[&str]) -> NewSchedule {
        NewSchedule {
            cycle_type,
            shift_label: "Night Shift".into(),
            start_date: start,
            start_time: WallClock::new(22, 0).unwrap(),
            end_time: WallClock::new(4, 0).unwrap(),
            participant_ids: users.iter().map(|u| UserId::new(*u)).collect(),
        }
    }

    #[test]
    fn test_clone_label() {
        let old = date(2024, 1, 1);
        let new = date(2024, 1, 8);
        assert_eq!(
            clone_label("Ronda 2024-01-01", old, new),
            "Ronda 2024-01-08"
        );
        assert_eq!(clone_label("Night Shift", old, new), "Night Shift");
    }

    #[test]
    fn test_cycle_date_math() {
        let h = harness();
        let weekly = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Weekly, &[]))
            .unwrap();
        assert_eq!(weekly.end_date, date(2024, 1, 7));

        let mut daily = night(date(2024, 1, 1), CycleType::Daily, &[]);
        daily.shift_label = "Day Shift".into();
        let daily = h.service.create_schedule(&h.admin, daily).unwrap();
        assert_eq!(daily.end_date, date(2024, 1, 1));
    }

    #[test]
    fn test_overlap_rejected() {
        let h = harness();
        let first = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Weekly, &["alice"]))
            .unwrap();

        let err = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 4), CycleType::Weekly, &["bob"]))
            .unwrap_err();
        match err {
            PatrolError::ScheduleConflict { existing, .. } => assert_eq!(existing, first.id),
            other => panic!("expected conflict, got {other:?}"),
        }

        // Nothing from the rejected attempt was stored
        assert_eq!(h.service.list_schedules(&h.admin).unwrap().len(), 1);

        // Another unit may use the same label and dates
        let other_unit = Identity::new("admin-6", "rt-06");
        assert!(h
            .service
            .create_schedule(&other_unit, night(date(2024, 1, 4), CycleType::Weekly, &[]))
            .is_ok());
    }

    #[test]
    fn test_blank_label_rejected() {
        let h = harness();
        let mut new = night(date(2024, 1, 1), CycleType::Daily, &[]);
        new.shift_label = "   ".into();
        assert!(matches!(
            h.service.create_schedule(&h.admin, new),
            Err(PatrolError::Validation(_))
        ));
    }

    #[test]
    fn test_roster_starts_pending() {
        let h = harness();
        let schedule = h
            .service
            .create_schedule(
                &h.admin,
                night(date(2024, 1, 1), CycleType::Weekly, &["alice", "bob", "alice"]),
            )
            .unwrap();

        let (_, participants) = h.service.get_schedule(&h.admin, schedule.id).unwrap();
        assert_eq!(participants.len(), 2);
        assert!(participants
            .iter()
            .all(|p| p.status == ronda_api::ParticipantStatus::Pending));
    }

    #[test]
    fn test_clone_latest() {
        let h = harness();
        let source = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Weekly, &["alice", "bob"]))
            .unwrap();

        let clone = h.service.clone_latest(&h.admin, date(2024, 1, 8)).unwrap();
        assert_ne!(clone.id, source.id);
        assert_eq!(clone.end_date, date(2024, 1, 14));
        assert_eq!(clone.start_time, source.start_time);
        assert_eq!(clone.shift_label, "Night Shift");

        let (_, roster) = h.service.get_schedule(&h.admin, clone.id).unwrap();
        let users: Vec<_> = roster.iter().map(|p| p.user_id.as_str().to_string()).collect();
        assert_eq!(users, vec!["alice", "bob"]);

        // Cloning onto an overlapping week is a conflict
        assert!(matches!(
            h.service.clone_latest(&h.admin, date(2024, 1, 10)),
            Err(PatrolError::ScheduleConflict { .. })
        ));
    }

    #[test]
    fn test_clone_without_history() {
        let h = harness();
        assert!(matches!(
            h.service.clone_latest(&h.admin, date(2024, 1, 8)),
            Err(PatrolError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_replaces_roster() {
        let h = harness();
        let schedule = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Weekly, &["alice", "bob"]))
            .unwrap();

        let updated = h
            .service
            .update_schedule(
                &h.admin,
                schedule.id,
                ScheduleUpdate {
                    end_time: Some(WallClock::new(5, 0).unwrap()),
                    participant_ids: Some(vec![UserId::new("carol")]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.end_time, WallClock::new(5, 0).unwrap());
        assert_eq!(updated.start_time, schedule.start_time);

        let (_, roster) = h.service.get_schedule(&h.admin, schedule.id).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].user_id, UserId::new("carol"));
    }

    #[test]
    fn test_update_other_unit_denied() {
        let h = harness();
        let schedule = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Weekly, &[]))
            .unwrap();

        let outsider = Identity::new("mallory", "rt-06");
        assert!(matches!(
            h.service
                .update_schedule(&outsider, schedule.id, ScheduleUpdate::default()),
            Err(PatrolError::CrossUnitAccess)
        ));
        assert!(matches!(
            h.service.delete_schedule(&outsider, schedule.id),
            Err(PatrolError::CrossUnitAccess)
        ));
    }

    #[test]
    fn test_reactivation_checks_overlap() {
        let h = harness();
        let first = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Weekly, &[]))
            .unwrap();
        h.service
            .update_schedule(
                &h.admin,
                first.id,
                ScheduleUpdate {
                    status: Some(ScheduleStatus::Inactive),
                    ..Default::default()
                },
            )
            .unwrap();
        h.service
            .create_schedule(&h.admin, night(date(2024, 1, 3), CycleType::Weekly, &[]))
            .unwrap();

        assert!(matches!(
            h.service.update_schedule(
                &h.admin,
                first.id,
                ScheduleUpdate {
                    status: Some(ScheduleStatus::Active),
                    ..Default::default()
                },
            ),
            Err(PatrolError::ScheduleConflict { .. })
        ));
    }

    #[test]
    fn test_closed_schedule_keeps_roster() {
        let h = harness();
        let schedule = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Daily, &["alice"]))
            .unwrap();
        h.clock.set(at(2024, 1, 2, 5, 0));
        h.service.close_schedule(&h.admin, schedule.id).unwrap();

        let result = h.service.update_schedule(
            &h.admin,
            schedule.id,
            ScheduleUpdate {
                start_time: Some(WallClock::new(1, 0).unwrap()),
                participant_ids: Some(vec![UserId::new("bob")]),
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(PatrolError::ScheduleClosed { schedule_id }) if schedule_id == schedule.id
        ));

        let (current, roster) = h.service.get_schedule(&h.admin, schedule.id).unwrap();
        assert_eq!(current.start_time, WallClock::new(22, 0).unwrap());
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].user_id, UserId::new("alice"));
        assert_eq!(roster[0].status, ronda_api::ParticipantStatus::Absent);
        assert!(roster[0].is_fined);
    }

    #[test]
    fn test_ended_schedules_read_inactive() {
        let h = harness();
        let schedule = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Daily, &[]))
            .unwrap();

        h.clock.set(at(2024, 1, 1, 23, 0));
        let (current, _) = h.service.get_schedule(&h.admin, schedule.id).unwrap();
        assert_eq!(current.status, ScheduleStatus::Active);

        h.clock.set(at(2024, 1, 2, 9, 0));
        let listed = h.service.list_schedules(&h.admin).unwrap();
        assert_eq!(listed[0].status, ScheduleStatus::Inactive);

        // An ended schedule no longer blocks its label
        assert!(h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Daily, &[]))
            .is_ok());
    }

    #[test]
    fn test_delete_schedule() {
        let h = harness();
        let schedule = h
            .service
            .create_schedule(&h.admin, night(date(2024, 1, 1), CycleType::Weekly, &["alice"]))
            .unwrap();

        assert_eq!(h.service.delete_schedule(&h.admin, schedule.id).unwrap(), schedule.id);
        assert!(matches!(
            h.service.get_schedule(&h.admin, schedule.id),
            Err(PatrolError::NotFound { .. })
        ));
    }
}
