//! Request handling: runs a protocol command against the patrol service

use ronda_api::{Command, ErrorCode, ErrorInfo, Request, Response, ResponsePayload, API_VERSION};
use ronda_core::{PatrolError, PatrolService};
use tracing::{debug, warn};

/// Execute one request and wrap the outcome in a response
pub fn handle(service: &PatrolService, request: Request) -> Response {
    let request_id = request.request_id;

    if request.api_version != API_VERSION {
        return Response::error(
            request_id,
            ErrorInfo::new(
                ErrorCode::InvalidRequest,
                format!(
                    "Unsupported API version {}, expected {}",
                    request.api_version, API_VERSION
                ),
            ),
        );
    }

    debug!(
        request_id,
        user_id = %request.identity.user_id,
        unit_id = %request.identity.unit_id,
        command = ?request.command,
        "Handling request"
    );

    match execute(service, &request) {
        Ok(payload) => Response::success(request_id, payload),
        Err(err) => {
            match &err {
                PatrolError::Store(_) | PatrolError::Ledger(_) => {
                    warn!(request_id, error = %err, "Request failed")
                }
                _ => debug!(request_id, error = %err, "Request rejected"),
            }
            Response::error(request_id, err.to_error_info())
        }
    }
}

fn execute(service: &PatrolService, request: &Request) -> Result<ResponsePayload, PatrolError> {
    let identity = &request.identity;

    let payload = match request.command.clone() {
        Command::CreateSchedule(new) => {
            ResponsePayload::Schedule(service.create_schedule(identity, new)?)
        }
        Command::CloneLatestSchedule { new_start_date } => {
            ResponsePayload::Schedule(service.clone_latest(identity, new_start_date)?)
        }
        Command::UpdateSchedule {
            schedule_id,
            update,
        } => ResponsePayload::Schedule(service.update_schedule(identity, schedule_id, update)?),
        Command::DeleteSchedule { schedule_id } => ResponsePayload::Deleted {
            id: service.delete_schedule(identity, schedule_id)?.to_string(),
        },
        Command::GetSchedule { schedule_id } => {
            let (schedule, participants) = service.get_schedule(identity, schedule_id)?;
            ResponsePayload::ScheduleDetail {
                schedule,
                participants,
            }
        }
        Command::ListSchedules => ResponsePayload::Schedules {
            schedules: service.list_schedules(identity)?,
        },
        Command::CloseSchedule { schedule_id } => {
            ResponsePayload::Closed(service.close_schedule(identity, schedule_id)?)
        }

        Command::AddParticipants {
            schedule_id,
            user_ids,
        } => ResponsePayload::Participants {
            participants: service.add_participants(identity, schedule_id, &user_ids)?,
        },
        Command::RemoveParticipant {
            schedule_id,
            user_id,
        } => {
            service.remove_participant(identity, schedule_id, &user_id)?;
            ResponsePayload::Deleted {
                id: user_id.to_string(),
            }
        }
        Command::ListParticipants { schedule_id } => ResponsePayload::Participants {
            participants: service.list_participants(identity, schedule_id)?,
        },
        Command::OverrideParticipant {
            schedule_id,
            user_id,
            status,
            notes,
        } => ResponsePayload::Participant(
            service.override_participant(identity, schedule_id, &user_id, status, notes)?,
        ),

        Command::CreateLocation(new) => {
            ResponsePayload::Location(service.create_location(identity, new)?)
        }
        Command::RotateToken { location_id } => {
            ResponsePayload::TokenRotated(service.rotate_token(identity, location_id)?)
        }
        Command::UpdateLocation {
            location_id,
            update,
        } => ResponsePayload::Location(service.update_location(identity, location_id, update)?),
        Command::DeleteLocation { location_id } => ResponsePayload::Deleted {
            id: service.delete_location(identity, location_id)?.to_string(),
        },
        Command::ListLocations => ResponsePayload::Locations {
            locations: service.list_locations(identity)?,
        },

        Command::Scan(scan) => ResponsePayload::Scan(service.scan(identity, &scan)?),
        Command::SubmitExcuse { notes } => {
            ResponsePayload::Participant(service.submit_excuse(identity, &notes)?)
        }
        Command::AttendanceHistory => ResponsePayload::Participants {
            participants: service.attendance_history(identity)?,
        },

        Command::UpsertFineSettings { settings } => ResponsePayload::FineSettings {
            settings: service.upsert_fine_settings(identity, &settings)?,
        },
        Command::ListFineSettings => ResponsePayload::FineSettings {
            settings: service.list_fine_settings(identity)?,
        },
        Command::ListFines { filter } => ResponsePayload::Fines {
            fines: service.list_fines(identity, &filter)?,
        },
        Command::MarkFinePaid { fine_id } => {
            ResponsePayload::Fine(service.mark_paid(identity, fine_id)?)
        }
        Command::GenerateFines { schedule_id } => ResponsePayload::Fines {
            fines: service.generate_for_schedule(identity, schedule_id)?,
        },
    };

    Ok(payload)
}
