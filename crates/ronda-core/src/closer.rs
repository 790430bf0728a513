//! Closing a schedule: finalize absences and fine them

use ronda_api::{CloseSummary, Identity, ScheduleStatus};
use ronda_store::AuditEventType;
use ronda_util::ScheduleId;
use tracing::{debug, info};

use crate::participant::finalize_absent;
use crate::schedules::owned_schedule;
use crate::{PatrolResult, PatrolService};

impl PatrolService {
    /// Mark every PENDING participant ABSENT, fine them, and deactivate the schedule.
    ///
    /// Runs in a single transaction. Closing an already closed schedule
    /// changes nothing and generates no new fines.
    pub fn close_schedule(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
    ) -> PatrolResult<CloseSummary> {
        let now = self.now();
        let tx = self.store.begin()?;
        let mut schedule = owned_schedule(&*tx, identity, schedule_id)?;

        let mut absent_count = 0;
        for mut participant in tx.list_participants(schedule.id)? {
            if finalize_absent(&mut participant)? {
                tx.update_participant(&participant)?;
                absent_count += 1;
                debug!(
                    schedule_id = %schedule.id,
                    user_id = %participant.user_id,
                    "Participant marked absent"
                );
            }
        }

        let fines = self.generate_fines_in(&*tx, identity, &schedule, now)?;

        if schedule.status != ScheduleStatus::Inactive {
            schedule.status = ScheduleStatus::Inactive;
            schedule.updated_at = now;
            tx.update_schedule(&schedule)?;
        }

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::ScheduleClosed {
                schedule_id: schedule.id,
                absent_count,
                fined_count: fines.len(),
            },
        )?;
        tx.commit()?;

        info!(
            schedule_id = %schedule.id,
            absent = absent_count,
            fined = fines.len(),
            "Schedule closed"
        );
        Ok(CloseSummary {
            schedule_id: schedule.id,
            absent_count,
            fines,
        })
    }
}
