//! Participant attendance state machine
//!
//! ```text
//!            clock-in             clock-out (once)
//! PENDING ───────────► PRESENT ──────────────────► PRESENT + clock_out_at
//!    │
//!    ├── excuse ─────► EXCUSED
//!    └── close ──────► ABSENT ── excuse ──► EXCUSED
//! ```
//!
//! Only an administrative override may move a participant back to PENDING.

use chrono::{DateTime, Local};
use ronda_api::{AttendanceLocation, Participant, ParticipantStatus};

use crate::{PatrolError, PatrolResult};

/// Something that happens to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantEvent {
    /// First valid scan of the shift
    ClockIn,
    /// Self-reported absence before the shift ends
    Excuse,
    /// Schedule closed while the participant was still pending
    FinalizeAbsent,
    /// Administrator sets the status directly
    AdminOverride(ParticipantStatus),
}

impl ParticipantEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ParticipantEvent::ClockIn => "clock-in",
            ParticipantEvent::Excuse => "excuse",
            ParticipantEvent::FinalizeAbsent => "finalize-absent",
            ParticipantEvent::AdminOverride(_) => "admin-override",
        }
    }
}

/// Status after `event` is applied to a participant in `current`
pub fn next_status(
    current: ParticipantStatus,
    event: ParticipantEvent,
) -> PatrolResult<ParticipantStatus> {
    use ParticipantStatus::*;

    match (current, event) {
        (Present, ParticipantEvent::ClockIn) => Err(PatrolError::IllegalTransition {
            from: current,
            event: event.name(),
        }),
        (Pending | Absent | Excused, ParticipantEvent::ClockIn) => Ok(Present),

        (Present, ParticipantEvent::Excuse) => Err(PatrolError::AlreadyPresent),
        (Pending | Absent | Excused, ParticipantEvent::Excuse) => Ok(Excused),

        (Pending, ParticipantEvent::FinalizeAbsent) => Ok(Absent),
        (Present | Absent | Excused, ParticipantEvent::FinalizeAbsent) => Ok(current),

        (_, ParticipantEvent::AdminOverride(target)) => Ok(target),
    }
}

/// What a valid scan does to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    ClockIn,
    ClockOut,
    AlreadyClockedOut,
}

impl ScanStep {
    pub fn for_participant(participant: &Participant) -> Self {
        match (participant.status, participant.clock_out_at) {
            (ParticipantStatus::Present, None) => ScanStep::ClockOut,
            (ParticipantStatus::Present, Some(_)) => ScanStep::AlreadyClockedOut,
            (
                ParticipantStatus::Pending | ParticipantStatus::Absent | ParticipantStatus::Excused,
                _,
            ) => ScanStep::ClockIn,
        }
    }
}

pub fn clock_in(
    participant: &mut Participant,
    now: DateTime<Local>,
    location: AttendanceLocation,
) -> PatrolResult<()> {
    participant.status = next_status(participant.status, ParticipantEvent::ClockIn)?;
    participant.attendance_at = Some(now);
    participant.clock_out_at = None;
    participant.attendance_location = Some(location);
    participant.clear_fine();
    Ok(())
}

pub fn clock_out(participant: &mut Participant, now: DateTime<Local>) -> PatrolResult<()> {
    match (participant.status, participant.attendance_at, participant.clock_out_at) {
        (ParticipantStatus::Present, Some(_), None) => {
            participant.clock_out_at = Some(now);
            Ok(())
        }
        _ => Err(PatrolError::IllegalTransition {
            from: participant.status,
            event: "clock-out",
        }),
    }
}

/// Returns false when the participant was already excused and nothing changed
pub fn excuse(participant: &mut Participant, notes: &str) -> PatrolResult<bool> {
    let next = next_status(participant.status, ParticipantEvent::Excuse)?;
    if participant.status == ParticipantStatus::Excused {
        return Ok(false);
    }

    participant.status = next;
    participant.notes = Some(notes.to_string());
    participant.clear_fine();
    Ok(true)
}

/// Returns true if the participant became ABSENT
pub fn finalize_absent(participant: &mut Participant) -> PatrolResult<bool> {
    let next = next_status(participant.status, ParticipantEvent::FinalizeAbsent)?;
    let changed = next != participant.status;
    participant.status = next;
    Ok(changed)
}

pub fn admin_override(
    participant: &mut Participant,
    status: ParticipantStatus,
    notes: Option<String>,
    now: DateTime<Local>,
) -> PatrolResult<()> {
    let previous = participant.status;
    participant.status = next_status(previous, ParticipantEvent::AdminOverride(status))?;

    match participant.status {
        ParticipantStatus::Present => {
            // Keeps the clock-out invariant: PRESENT always has a check-in time
            if participant.attendance_at.is_none() {
                participant.attendance_at = Some(now);
            }
        }
        ParticipantStatus::Pending | ParticipantStatus::Absent | ParticipantStatus::Excused => {
            participant.attendance_at = None;
            participant.clock_out_at = None;
            participant.attendance_location = None;
        }
    }

    if status == ParticipantStatus::Pending {
        participant.clear_fine();
    }
    if notes.is_some() {
        participant.notes = notes;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ronda_api::AttendanceMethod;
    use ronda_util::{LocationId, ScheduleId, UserId};
    use rust_decimal::Decimal;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn participant() -> Participant {
        Participant::pending(ScheduleId::new(), UserId::new("alice"))
    }

    fn scan_location() -> AttendanceLocation {
        AttendanceLocation {
            location_id: LocationId::new(),
            latitude: -6.2,
            longitude: 106.8,
            distance_meters: 12.0,
            method: AttendanceMethod::Qr,
        }
    }

    #[test]
    fn transition_table() {
        use ParticipantStatus::*;

        assert_eq!(next_status(Pending, ParticipantEvent::ClockIn).unwrap(), Present);
        assert_eq!(next_status(Excused, ParticipantEvent::ClockIn).unwrap(), Present);
        assert!(matches!(
            next_status(Present, ParticipantEvent::ClockIn),
            Err(PatrolError::IllegalTransition { .. })
        ));

        assert_eq!(next_status(Pending, ParticipantEvent::Excuse).unwrap(), Excused);
        assert_eq!(next_status(Excused, ParticipantEvent::Excuse).unwrap(), Excused);
        assert!(matches!(
            next_status(Present, ParticipantEvent::Excuse),
            Err(PatrolError::AlreadyPresent)
        ));

        assert_eq!(next_status(Pending, ParticipantEvent::FinalizeAbsent).unwrap(), Absent);
        assert_eq!(next_status(Present, ParticipantEvent::FinalizeAbsent).unwrap(), Present);
        assert_eq!(next_status(Excused, ParticipantEvent::FinalizeAbsent).unwrap(), Excused);

        // Only path back to PENDING
        assert_eq!(
            next_status(Absent, ParticipantEvent::AdminOverride(Pending)).unwrap(),
            Pending
        );
    }

    #[test]
    fn scan_steps_follow_status() {
        let mut p = participant();
        assert_eq!(ScanStep::for_participant(&p), ScanStep::ClockIn);

        clock_in(&mut p, at(22, 5), scan_location()).unwrap();
        assert_eq!(ScanStep::for_participant(&p), ScanStep::ClockOut);

        clock_out(&mut p, at(4, 0)).unwrap();
        assert_eq!(ScanStep::for_participant(&p), ScanStep::AlreadyClockedOut);
    }

    #[test]
    fn clock_in_clears_fine_flags() {
        let mut p = participant();
        p.status = ParticipantStatus::Absent;
        p.is_fined = true;
        p.fine_amount = Decimal::from(50000);

        clock_in(&mut p, at(22, 5), scan_location()).unwrap();
        assert_eq!(p.status, ParticipantStatus::Present);
        assert!(!p.is_fined);
        assert_eq!(p.fine_amount, Decimal::ZERO);
        assert_eq!(p.attendance_at, Some(at(22, 5)));
    }

    #[test]
    fn clock_out_requires_check_in() {
        let mut p = participant();
        assert!(clock_out(&mut p, at(4, 0)).is_err());
        assert!(p.clock_out_at.is_none());
    }

    #[test]
    fn excuse_is_idempotent() {
        let mut p = participant();
        assert!(excuse(&mut p, "sick").unwrap());
        let stored = p.clone();

        assert!(!excuse(&mut p, "still sick").unwrap());
        assert_eq!(p, stored);
        assert_eq!(p.notes.as_deref(), Some("sick"));
    }

    #[test]
    fn override_away_from_present_clears_times() {
        let mut p = participant();
        clock_in(&mut p, at(22, 5), scan_location()).unwrap();
        clock_out(&mut p, at(4, 0)).unwrap();

        admin_override(&mut p, ParticipantStatus::Pending, Some("rescan".into()), at(9, 0))
            .unwrap();
        assert_eq!(p.status, ParticipantStatus::Pending);
        assert!(p.attendance_at.is_none());
        assert!(p.clock_out_at.is_none());
        assert_eq!(p.notes.as_deref(), Some("rescan"));
    }

    #[test]
    fn override_to_present_sets_check_in() {
        let mut p = participant();
        admin_override(&mut p, ParticipantStatus::Present, None, at(23, 0)).unwrap();
        assert_eq!(p.attendance_at, Some(at(23, 0)));
        assert_eq!(ScanStep::for_participant(&p), ScanStep::ClockOut);
    }
}
