//! Self-reported absence

use ronda_api::{Identity, Participant};
use ronda_store::AuditEventType;
use tracing::{debug, info};

use crate::participant::excuse;
use crate::{PatrolError, PatrolResult, PatrolService};

impl PatrolService {
    /// Excuse the caller from today's duty.
    ///
    /// Submitting again once excused returns the stored record unchanged.
    pub fn submit_excuse(&self, identity: &Identity, notes: &str) -> PatrolResult<Participant> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(PatrolError::validation("excuse notes cannot be empty"));
        }

        let now = self.now();
        let today = now.date_naive();
        let tx = self.store.begin()?;

        tx.deactivate_ended(&identity.unit_id, today, now)?;
        let schedule = tx
            .find_active_for_user(&identity.unit_id, &identity.user_id, today)?
            .ok_or(PatrolError::NoActiveDutyToday)?;
        let mut participant = tx
            .get_participant(schedule.id, &identity.user_id)?
            .ok_or(PatrolError::NoActiveDutyToday)?;

        if !excuse(&mut participant, notes)? {
            debug!(
                schedule_id = %schedule.id,
                user_id = %identity.user_id,
                "Already excused"
            );
            return Ok(participant);
        }

        tx.update_participant(&participant)?;
        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ExcuseSubmitted {
                schedule_id: schedule.id,
                user_id: identity.user_id.clone(),
            },
        )?;
        tx.commit()?;

        info!(schedule_id = %schedule.id, user_id = %identity.user_id, "Excuse submitted");
        Ok(participant)
    }
}
