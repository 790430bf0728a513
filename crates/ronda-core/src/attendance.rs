//! The geofenced QR scan protocol

use ronda_api::{
    AttendanceLocation, AttendanceMethod, Identity, Participant, ScanOutcome, ScanRequest,
};
use ronda_store::AuditEventType;
use ronda_util::Coordinates;
use tracing::{debug, info};

use crate::participant::{clock_in, clock_out, ScanStep};
use crate::{PatrolError, PatrolResult, PatrolService};

/// Message returned for a scan after the participant already clocked out
pub const ALREADY_CLOCKED_OUT_MESSAGE: &str = "Already clocked out for this shift";

impl PatrolService {
    /// Verify a scan and advance the caller's attendance.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// token, token expiry, unit, geofence, duty today, shift window.
    /// The first accepted scan of a shift clocks in, the second clocks
    /// out, any later one changes nothing.
    pub fn scan(&self, identity: &Identity, request: &ScanRequest) -> PatrolResult<ScanOutcome> {
        let scanned_at = Coordinates::new(request.latitude, request.longitude);
        if !scanned_at.is_valid() {
            return Err(PatrolError::validation(format!(
                "invalid coordinates ({}, {})",
                request.latitude, request.longitude
            )));
        }

        let now = self.now();
        let today = now.date_naive();
        let tx = self.store.begin()?;

        let location = tx
            .find_location_by_token(&request.qr_token)?
            .ok_or(PatrolError::InvalidToken)?;

        if let Some(expired_at) = location.token_expires_at {
            if now > expired_at {
                return Err(PatrolError::TokenExpired { expired_at });
            }
        }

        if location.unit_id != identity.unit_id {
            return Err(PatrolError::CrossUnitAccess);
        }

        let distance = scanned_at.distance_to(&location.coordinates());
        debug!(
            location_id = %location.id,
            distance_m = distance,
            radius_m = location.radius_meters,
            "Geofence distance computed"
        );
        if distance > f64::from(location.radius_meters) {
            return Err(PatrolError::OutsideGeofence {
                distance_meters: distance.round() as u64,
                radius_meters: location.radius_meters,
            });
        }

        tx.deactivate_ended(&identity.unit_id, today, now)?;
        let schedule = tx
            .find_active_for_user(&identity.unit_id, &identity.user_id, today)?
            .ok_or(PatrolError::NoActiveDutyToday)?;

        let window = schedule.window();
        if !window.contains(&now) {
            return Err(PatrolError::OutsideShiftWindow {
                start: window.start,
                end: window.end,
            });
        }

        let mut participant = tx
            .get_participant(schedule.id, &identity.user_id)?
            .ok_or(PatrolError::NoActiveDutyToday)?;

        let outcome = match ScanStep::for_participant(&participant) {
            ScanStep::ClockIn => {
                clock_in(
                    &mut participant,
                    now,
                    AttendanceLocation {
                        location_id: location.id,
                        latitude: request.latitude,
                        longitude: request.longitude,
                        distance_meters: distance,
                        method: AttendanceMethod::Qr,
                    },
                )?;
                tx.update_participant(&participant)?;
                self.audit(
                    &*tx,
                    identity,
                    now,
                    AuditEventType::ClockedIn {
                        schedule_id: schedule.id,
                        user_id: identity.user_id.clone(),
                        location_id: location.id,
                        distance_meters: distance,
                    },
                )?;
                info!(
                    schedule_id = %schedule.id,
                    user_id = %identity.user_id,
                    distance_m = distance,
                    "Clocked in"
                );
                ScanOutcome::ClockedIn {
                    participant,
                    distance_meters: distance,
                }
            }
            ScanStep::ClockOut => {
                clock_out(&mut participant, now)?;
                tx.update_participant(&participant)?;
                self.audit(
                    &*tx,
                    identity,
                    now,
                    AuditEventType::ClockedOut {
                        schedule_id: schedule.id,
                        user_id: identity.user_id.clone(),
                    },
                )?;
                info!(
                    schedule_id = %schedule.id,
                    user_id = %identity.user_id,
                    "Clocked out"
                );
                ScanOutcome::ClockedOut { participant }
            }
            ScanStep::AlreadyClockedOut => {
                debug!(
                    schedule_id = %schedule.id,
                    user_id = %identity.user_id,
                    "Scan after clock-out ignored"
                );
                ScanOutcome::AlreadyClockedOut {
                    participant,
                    message: ALREADY_CLOCKED_OUT_MESSAGE.to_string(),
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Every roster membership of the caller, most recent schedule first
    pub fn attendance_history(&self, identity: &Identity) -> PatrolResult<Vec<Participant>> {
        let tx = self.store.begin()?;
        let history = tx.participant_history(&identity.user_id)?;
        tx.commit()?;
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{at, harness, Harness};
    use chrono::{Duration, NaiveDate};
    use ronda_api::{CycleType, NewLocation, NewSchedule, ParticipantStatus, PostLocation};
    use ronda_util::{UserId, WallClock};

    const POST_LAT: f64 = -6.2001;
    const POST_LON: f64 = 106.8166;

    fn setup(h: &Harness, start: (u8, u8), end: (u8, u8)) -> PostLocation {
        h.service
            .create_schedule(
                &h.admin,
                NewSchedule {
                    cycle_type: CycleType::Weekly,
                    shift_label: "Night Shift".into(),
                    start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    start_time: WallClock::new(start.0, start.1).unwrap(),
                    end_time: WallClock::new(end.0, end.1).unwrap(),
                    participant_ids: vec![UserId::new("alice")],
                },
            )
            .unwrap();
        h.service
            .create_location(
                &h.admin,
                NewLocation {
                    name: "Main gate".into(),
                    latitude: POST_LAT,
                    longitude: POST_LON,
                    radius_meters: Some(50),
                },
            )
            .unwrap()
    }

    fn scan_here(token: &str) -> ScanRequest {
        ScanRequest {
            qr_token: token.to_string(),
            latitude: POST_LAT,
            longitude: POST_LON,
        }
    }

    fn alice() -> Identity {
        Identity::new("alice", "rt-05")
    }

    #[test]
    fn unknown_token() {
        let h = harness();
        setup(&h, (22, 0), (4, 0));
        assert!(matches!(
            h.service.scan(&alice(), &scan_here("nope")),
            Err(PatrolError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_wins_over_later_checks() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));
        let rotation = h.service.rotate_token(&h.admin, post.id).unwrap();

        // Past expiry, far away and outside the window: expiry is reported
        h.clock.advance(Duration::hours(25));
        let mut request = scan_here(&rotation.qr_token);
        request.latitude += 1.0;
        match h.service.scan(&alice(), &request) {
            Err(PatrolError::TokenExpired { expired_at }) => {
                assert_eq!(Some(expired_at), rotation.token_expires_at)
            }
            other => panic!("expected expiry, got {other:?}"),
        }
    }

    #[test]
    fn old_token_stops_working_after_rotation() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));
        h.service.rotate_token(&h.admin, post.id).unwrap();

        h.clock.set(at(2024, 1, 1, 23, 0));
        assert!(matches!(
            h.service.scan(&alice(), &scan_here(&post.qr_token)),
            Err(PatrolError::InvalidToken)
        ));
    }

    #[test]
    fn other_unit_post() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));
        let stranger = Identity::new("alice", "rt-06");
        assert!(matches!(
            h.service.scan(&stranger, &scan_here(&post.qr_token)),
            Err(PatrolError::CrossUnitAccess)
        ));
    }

    #[test]
    fn outside_geofence_reports_distance() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));
        h.clock.set(at(2024, 1, 1, 23, 0));

        let request = ScanRequest {
            qr_token: post.qr_token.clone(),
            latitude: POST_LAT - 0.001,
            longitude: POST_LON,
        };
        match h.service.scan(&alice(), &request) {
            Err(PatrolError::OutsideGeofence {
                distance_meters,
                radius_meters,
            }) => {
                assert_eq!(radius_meters, 50);
                assert!((105..=118).contains(&distance_meters), "got {distance_meters}");
            }
            other => panic!("expected geofence failure, got {other:?}"),
        }
    }

    #[test]
    fn no_duty_for_unassigned_user() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));
        h.clock.set(at(2024, 1, 1, 23, 0));

        let bob = Identity::new("bob", "rt-05");
        assert!(matches!(
            h.service.scan(&bob, &scan_here(&post.qr_token)),
            Err(PatrolError::NoActiveDutyToday)
        ));
    }

    #[test]
    fn overnight_window() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));

        for (hour, minute, ok) in [(23, 30, true), (2, 0, true), (10, 0, false), (21, 59, false)] {
            h.clock.set(at(2024, 1, 3, hour, minute));
            let result = h.service.scan(&alice(), &scan_here(&post.qr_token));
            if ok {
                assert!(result.is_ok(), "{hour}:{minute} should be accepted");
            } else {
                assert!(
                    matches!(result, Err(PatrolError::OutsideShiftWindow { .. })),
                    "{hour}:{minute} should be outside the window"
                );
            }
        }
    }

    #[test]
    fn same_day_window() {
        let h = harness();
        let post = setup(&h, (8, 0), (16, 0));

        let cases = [(7, 59, false), (8, 0, true), (16, 0, true), (16, 1, false)];
        for (hour, minute, ok) in cases {
            h.clock.set(at(2024, 1, 2, hour, minute));
            let result = h.service.scan(&alice(), &scan_here(&post.qr_token));
            assert_eq!(result.is_ok(), ok, "{hour}:{minute}");
        }
    }

    #[test]
    fn double_scan_clocks_out_then_is_a_no_op() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));

        h.clock.set(at(2024, 1, 1, 22, 10));
        let first = h.service.scan(&alice(), &scan_here(&post.qr_token)).unwrap();
        let checked_in = match &first {
            ScanOutcome::ClockedIn { participant, .. } => participant.clone(),
            other => panic!("expected clock-in, got {other:?}"),
        };
        assert_eq!(checked_in.status, ParticipantStatus::Present);
        assert_eq!(checked_in.attendance_at, Some(at(2024, 1, 1, 22, 10)));
        assert!(checked_in.clock_out_at.is_none());

        h.clock.set(at(2024, 1, 1, 23, 50));
        let second = h.service.scan(&alice(), &scan_here(&post.qr_token)).unwrap();
        let checked_out = match &second {
            ScanOutcome::ClockedOut { participant } => participant.clone(),
            other => panic!("expected clock-out, got {other:?}"),
        };
        assert_eq!(checked_out.attendance_at, checked_in.attendance_at);
        assert_eq!(checked_out.clock_out_at, Some(at(2024, 1, 1, 23, 50)));

        h.clock.set(at(2024, 1, 1, 23, 55));
        let third = h.service.scan(&alice(), &scan_here(&post.qr_token)).unwrap();
        assert!(matches!(third, ScanOutcome::AlreadyClockedOut { .. }));
        assert_eq!(third.participant(), &checked_out);
    }

    #[test]
    fn clock_in_records_scan_location() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));
        h.clock.set(at(2024, 1, 1, 22, 30));

        let request = ScanRequest {
            qr_token: post.qr_token.clone(),
            latitude: POST_LAT + 0.0001,
            longitude: POST_LON,
        };
        let outcome = h.service.scan(&alice(), &request).unwrap();
        let recorded = outcome.participant().attendance_location.clone().unwrap();
        assert_eq!(recorded.location_id, post.id);
        assert_eq!(recorded.method, AttendanceMethod::Qr);
        assert!(recorded.distance_meters > 10.0 && recorded.distance_meters < 12.5);
    }

    #[test]
    fn history_lists_memberships() {
        let h = harness();
        let post = setup(&h, (22, 0), (4, 0));
        h.clock.set(at(2024, 1, 1, 22, 30));
        h.service.scan(&alice(), &scan_here(&post.qr_token)).unwrap();

        let history = h.service.attendance_history(&alice()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ParticipantStatus::Present);
    }
}
