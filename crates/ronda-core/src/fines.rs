//! Fine generation, settings and payment

use chrono::{DateTime, Local};
use ronda_api::{
    DutySchedule, FineFilter, FineRecord, FineSetting, FineSettingInput, FineStatus, FineType,
    Identity, ParticipantStatus,
};
use ronda_ledger::FinePosting;
use ronda_store::{AuditEventType, StoreTx};
use ronda_util::{FineId, ScheduleId, UnitId};
use rust_decimal::Decimal;
use tracing::{error, info};

use crate::schedules::owned_schedule;
use crate::service::ensure_same_unit;
use crate::{PatrolError, PatrolResult, PatrolService};

impl PatrolService {
    /// Amount owed for one occurrence of `fine_type`, or None when no fine applies.
    ///
    /// ABSENT uses the unit's setting: an active setting gives its amount, an
    /// inactive one disables the fine, and with no setting at all the
    /// configured default applies. LATE and EARLY_LEAVE can be configured
    /// but are never charged.
    pub(crate) fn assess_fine(
        &self,
        tx: &dyn StoreTx,
        unit_id: &UnitId,
        fine_type: FineType,
    ) -> PatrolResult<Option<Decimal>> {
        match fine_type {
            FineType::Absent => Ok(match tx.get_fine_setting(unit_id, fine_type)? {
                Some(setting) if setting.is_active => Some(setting.amount),
                Some(_) => None,
                None => Some(self.settings.fines.default_absent_amount),
            }),
            FineType::Late | FineType::EarlyLeave => Ok(None),
        }
    }

    /// Fine every ABSENT, not yet fined participant of `schedule` inside `tx`
    pub(crate) fn generate_fines_in(
        &self,
        tx: &dyn StoreTx,
        identity: &Identity,
        schedule: &DutySchedule,
        now: DateTime<Local>,
    ) -> PatrolResult<Vec<FineRecord>> {
        let mut fines = Vec::new();
        let Some(amount) = self.assess_fine(tx, &schedule.unit_id, FineType::Absent)? else {
            info!(schedule_id = %schedule.id, "ABSENT fines disabled for unit");
            return Ok(fines);
        };

        for mut participant in tx.list_participants(schedule.id)? {
            if participant.status != ParticipantStatus::Absent || participant.is_fined {
                continue;
            }

            participant.is_fined = true;
            participant.fine_amount = amount;
            tx.update_participant(&participant)?;

            let fine = FineRecord {
                id: FineId::new(),
                unit_id: schedule.unit_id.clone(),
                user_id: participant.user_id.clone(),
                schedule_id: schedule.id,
                fine_type: FineType::Absent,
                amount,
                status: FineStatus::Unpaid,
                generated_at: now,
                paid_at: None,
            };
            tx.insert_fine(&fine)?;
            self.audit(
                tx,
                identity,
                now,
                AuditEventType::FineGenerated {
                    fine_id: fine.id,
                    schedule_id: schedule.id,
                    user_id: fine.user_id.clone(),
                    fine_type: fine.fine_type,
                    amount,
                },
            )?;
            fines.push(fine);
        }

        Ok(fines)
    }

    /// Generate fines for a schedule on its own, outside of closing
    pub fn generate_for_schedule(
        &self,
        identity: &Identity,
        schedule_id: ScheduleId,
    ) -> PatrolResult<Vec<FineRecord>> {
        let now = self.now();
        let tx = self.store.begin()?;
        let schedule = owned_schedule(&*tx, identity, schedule_id)?;
        let fines = self.generate_fines_in(&*tx, identity, &schedule, now)?;
        tx.commit()?;

        info!(schedule_id = %schedule.id, fined = fines.len(), "Fines generated");
        Ok(fines)
    }

    /// Mark a fine paid and post it to the ledger, both or neither
    pub fn mark_paid(&self, identity: &Identity, fine_id: FineId) -> PatrolResult<FineRecord> {
        let now = self.now();
        let tx = self.store.begin()?;

        let mut fine = tx
            .get_fine(fine_id)?
            .ok_or_else(|| PatrolError::not_found("fine", fine_id))?;
        ensure_same_unit(identity, &fine.unit_id)?;

        match fine.status {
            FineStatus::Paid => return Err(PatrolError::AlreadyPaid),
            FineStatus::Unpaid => {}
        }

        fine.status = FineStatus::Paid;
        fine.paid_at = Some(now);
        tx.update_fine(&fine)?;

        let posting = FinePosting::inbound(
            fine.unit_id.clone(),
            fine.id,
            fine.amount,
            format!(
                "Patrol {} fine for {} (schedule {})",
                fine.fine_type, fine.user_id, fine.schedule_id
            ),
            now,
        );
        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::FinePaid {
                fine_id: fine.id,
                amount: fine.amount,
            },
        )?;

        // An error here drops the transaction, rolling back the status flip
        let receipt = self.ledger.post_fine(&posting)?;

        if let Err(e) = tx.commit() {
            error!(
                fine_id = %fine.id,
                receipt_id = %receipt.receipt_id,
                error = %e,
                "Ledger posted but fine status could not be committed"
            );
            return Err(e.into());
        }

        info!(
            fine_id = %fine.id,
            user_id = %fine.user_id,
            amount = %fine.amount,
            receipt_id = %receipt.receipt_id,
            "Fine paid"
        );
        Ok(fine)
    }

    /// Create or update settings keyed by `(unit, fine_type)`.
    ///
    /// Returns the unit's full settings afterwards.
    pub fn upsert_fine_settings(
        &self,
        identity: &Identity,
        inputs: &[FineSettingInput],
    ) -> PatrolResult<Vec<FineSetting>> {
        for input in inputs {
            if input.amount.is_sign_negative() && !input.amount.is_zero() {
                return Err(PatrolError::validation(format!(
                    "{} fine amount cannot be negative",
                    input.fine_type
                )));
            }
        }

        let now = self.now();
        let tx = self.store.begin()?;
        for input in inputs {
            tx.upsert_fine_setting(&FineSetting {
                unit_id: identity.unit_id.clone(),
                fine_type: input.fine_type,
                amount: input.amount,
                tolerance_minutes: input.tolerance_minutes,
                is_active: input.is_active,
            })?;
        }

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::FineSettingsUpdated {
                fine_types: inputs.iter().map(|i| i.fine_type).collect(),
            },
        )?;
        let settings = tx.list_fine_settings(&identity.unit_id)?;
        tx.commit()?;

        info!(unit_id = %identity.unit_id, count = inputs.len(), "Fine settings updated");
        Ok(settings)
    }

    pub fn list_fine_settings(&self, identity: &Identity) -> PatrolResult<Vec<FineSetting>> {
        let tx = self.store.begin()?;
        let settings = tx.list_fine_settings(&identity.unit_id)?;
        tx.commit()?;
        Ok(settings)
    }

    /// Fines of the caller's unit, newest first
    pub fn list_fines(
        &self,
        identity: &Identity,
        filter: &FineFilter,
    ) -> PatrolResult<Vec<FineRecord>> {
        let tx = self.store.begin()?;
        let fines = tx.list_fines(&identity.unit_id, filter)?;
        tx.commit()?;
        Ok(fines)
    }
}
