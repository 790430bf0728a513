//! The patrol service: shared collaborators and helpers

use chrono::{DateTime, Local};
use ronda_api::Identity;
use ronda_config::Settings;
use ronda_ledger::Ledger;
use ronda_store::{AuditEvent, AuditEventType, Store, StoreTx};
use ronda_util::{Clock, UnitId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::{PatrolError, PatrolResult};

/// Entry point for every patrol operation.
///
/// Holds no per-request state. Each operation opens its own store
/// transaction, so the service can be shared freely between callers.
pub struct PatrolService {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: Settings,
}

impl PatrolService {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        info!(
            token_ttl_hours = settings.attendance.token_ttl.num_hours(),
            default_radius_m = settings.attendance.default_radius_meters,
            default_absent_amount = %settings.fines.default_absent_amount,
            "Patrol service initialized"
        );

        Self {
            store,
            ledger,
            clock,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub(crate) fn audit(
        &self,
        tx: &dyn StoreTx,
        identity: &Identity,
        now: DateTime<Local>,
        event: AuditEventType,
    ) -> PatrolResult<()> {
        tx.append_audit(&AuditEvent::new(
            now,
            identity.unit_id.clone(),
            identity.user_id.clone(),
            event,
        ))?;
        Ok(())
    }
}

/// Administrative access is limited to the caller's own unit
pub(crate) fn ensure_same_unit(identity: &Identity, owner: &UnitId) -> PatrolResult<()> {
    if &identity.unit_id == owner {
        Ok(())
    } else {
        Err(PatrolError::CrossUnitAccess)
    }
}

/// Drops duplicates while keeping first-seen order
pub(crate) fn unique_users(user_ids: &[UserId]) -> PatrolResult<Vec<UserId>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        if user_id.as_str().trim().is_empty() {
            return Err(PatrolError::validation("participant id cannot be empty"));
        }
        if seen.insert(user_id) {
            unique.push(user_id.clone());
        }
    }
    Ok(unique)
}
