//! Roster assignment and administrative overrides

use ronda_api::{Identity, Participant, ParticipantStatus};
use ronda_store::AuditEventType;
use ronda_util::{ScheduleId, UserId};
use tracing::info;

use crate::participant::admin_override;
use crate::schedules::{ensure_open, owned_schedule};
use crate::service::unique_users;
use crate::{PatrolError, PatrolResult, PatrolService};

impl PatrolService {
    /// Add members to a roster. Existing members are left untouched.
    ///
    /// Returns the full roster afterwards.
    pub fn add_participants(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
        user_ids: &[UserId],
    ) -> PatrolResult<Vec<Participant>> {
        let user_ids = unique_users(user_ids)?;
        let now = self.now();

        let tx = self.store.begin()?;
        tx.deactivate_ended(&identity.unit_id, now.date_naive(), now)?;
        let schedule = owned_schedule(&*tx, identity, schedule_id)?;
        ensure_open(&schedule)?;

        let mut added = Vec::new();
        for user_id in user_ids {
            if tx.get_participant(schedule.id, &user_id)?.is_none() {
                tx.insert_participant(&Participant::pending(schedule.id, user_id.clone()))?;
                added.push(user_id);
            }
        }

        if !added.is_empty() {
            self.audit(
                &*tx,
                identity,
                now,
                AuditEventType::ParticipantsAdded {
                    schedule_id: schedule.id,
                    user_ids: added.clone(),
                },
            )?;
        }
        let roster = tx.list_participants(schedule.id)?;
        tx.commit()?;

        info!(schedule_id = %schedule.id, added = added.len(), "Participants added");
        Ok(roster)
    }

    pub fn remove_participant(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
        user_id: &UserId,
    ) -> PatrolResult<()> {
        let now = self.now();
        let tx = self.store.begin()?;
        tx.deactivate_ended(&identity.unit_id, now.date_naive(), now)?;
        let schedule = owned_schedule(&*tx, identity, schedule_id)?;
        ensure_open(&schedule)?;

        if !tx.delete_participant(schedule.id, user_id)? {
            return Err(PatrolError::not_found("participant", user_id));
        }

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ParticipantRemoved {
                schedule_id: schedule.id,
                user_id: user_id.clone(),
            },
        )?;
        tx.commit()?;

        info!(schedule_id = %schedule.id, user_id = %user_id, "Participant removed");
        Ok(())
    }

    pub fn list_participants(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
    ) -> PatrolResult<Vec<Participant>> {
        let tx = self.store.begin()?;
        let schedule = owned_schedule(&*tx, identity, schedule_id)?;
        let participants = tx.list_participants(schedule.id)?;
        tx.commit()?;
        Ok(participants)
    }

    /// Set a participant's status directly. The only way back to PENDING.
    pub fn override_participant(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
        user_id: &UserId,
        status: ParticipantStatus,
        notes: Option<String>,
    ) -> PatrolResult<Participant> {
        let now = self.now();
        let tx = self.store.begin()?;
        let schedule = owned_schedule(&*tx, identity, schedule_id)?;

        let mut participant = tx
            .get_participant(schedule.id, user_id)?
            .ok_or_else(|| PatrolError::not_found("participant", user_id))?;
        let from = participant.status;

        admin_override(&mut participant, status, notes, now)?;
        tx.update_participant(&participant)?;

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ParticipantOverridden {
                schedule_id: schedule.id,
                user_id: user_id.clone(),
                from,
                to: status,
            },
        )?;
        tx.commit()?;

        info!(
            schedule_id = %schedule.id,
            user_id = %user_id,
            from = %from,
            to = %status,
            actor = %identity.user_id,
            "Participant status overridden"
        );
        Ok(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::harness;
    use chrono::NaiveDate;
    use ronda_api::{CycleType, NewSchedule};
    use ronda_util::WallClock;

    fn schedule(h: &crate::service::test_support::Harness, users: &[&str]) -> ScheduleId {
        h.service
            .create_schedule(
                &h.admin,
                NewSchedule {
                    cycle_type: CycleType::Weekly,
                    shift_label: "Night Shift".into(),
                    start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    start_time: WallClock::new(22, 0).unwrap(),
                    end_time: WallClock::new(4, 0).unwrap(),
                    participant_ids: users.iter().map(|u| UserId::new(*u)).collect(),
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn add_skips_existing_members() {
        let h = harness();
        let id = schedule(&h, &["alice"]);

        h.service
            .override_participant(&h.admin, id, &UserId::new("alice"), ParticipantStatus::Excused, None)
            .unwrap();

        let roster = h
            .service
            .add_participants(&h.admin, id, &[UserId::new("alice"), UserId::new("bob")])
            .unwrap();
        assert_eq!(roster.len(), 2);

        // Alice kept her status
        let alice = roster.iter().find(|p| p.user_id.as_str() == "alice").unwrap();
        assert_eq!(alice.status, ParticipantStatus::Excused);
        let bob = roster.iter().find(|p| p.user_id.as_str() == "bob").unwrap();
        assert_eq!(bob.status, ParticipantStatus::Pending);
    }

    #[test]
    fn remove_unknown_member() {
        let h = harness();
        let id = schedule(&h, &["alice"]);

        assert!(matches!(
            h.service.remove_participant(&h.admin, id, &UserId::new("bob")),
            Err(PatrolError::NotFound { kind: "participant", .. })
        ));

        h.service
            .remove_participant(&h.admin, id, &UserId::new("alice"))
            .unwrap();
        assert!(h.service.list_participants(&h.admin, id).unwrap().is_empty());
    }

    #[test]
    fn closed_roster_is_frozen() {
        let h = harness();
        let id = schedule(&h, &["alice"]);
        h.service.close_schedule(&h.admin, id).unwrap();

        assert!(matches!(
            h.service.add_participants(&h.admin, id, &[UserId::new("bob")]),
            Err(PatrolError::ScheduleClosed { .. })
        ));
        assert!(matches!(
            h.service.remove_participant(&h.admin, id, &UserId::new("alice")),
            Err(PatrolError::ScheduleClosed { .. })
        ));

        let roster = h.service.list_participants(&h.admin, id).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].user_id.as_str(), "alice");
        assert_eq!(roster[0].status, ParticipantStatus::Absent);
        assert!(roster[0].is_fined);

        // Corrections still go through
        let corrected = h
            .service
            .override_participant(&h.admin, id, &UserId::new("alice"), ParticipantStatus::Excused, None)
            .unwrap();
        assert_eq!(corrected.status, ParticipantStatus::Excused);
    }

    #[test]
    fn override_returns_to_pending() {
        let h = harness();
        let id = schedule(&h, &["alice"]);
        let alice = UserId::new("alice");

        h.service
            .override_participant(&h.admin, id, &alice, ParticipantStatus::Absent, None)
            .unwrap();
        let back = h
            .service
            .override_participant(&h.admin, id, &alice, ParticipantStatus::Pending, Some("mistake".into()))
            .unwrap();
        assert_eq!(back.status, ParticipantStatus::Pending);
        assert_eq!(back.notes.as_deref(), Some("mistake"));
    }

    #[test]
    fn roster_is_unit_scoped() {
        let h = harness();
        let id = schedule(&h, &["alice"]);
        let outsider = Identity::new("mallory", "rt-06");

        assert!(matches!(
            h.service.list_participants(&outsider, id),
            Err(PatrolError::CrossUnitAccess)
        ));
        assert!(matches!(
            h.service.add_participants(&outsider, id, &[UserId::new("mallory")]),
            Err(PatrolError::CrossUnitAccess)
        ));
    }
}
