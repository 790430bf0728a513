//! Command-line surface: subcommands and their mapping onto protocol commands

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Subcommand};
use ronda_api::{
    Command, CycleType, FineFilter, FineSettingInput, FineStatus, FineType, LocationUpdate,
    NewLocation, NewSchedule, ParticipantStatus, ScanRequest, ScheduleStatus, ScheduleUpdate,
};
use ronda_util::{FineId, LocationId, ScheduleId, UserId, WallClock};
use rust_decimal::Decimal;

/// Default number of audit events shown
pub const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Subcommand, Debug)]
pub enum Action {
    /// Duty schedules
    #[command(subcommand)]
    Schedule(ScheduleAction),

    /// Schedule rosters
    #[command(subcommand)]
    Roster(RosterAction),

    /// Post locations and QR tokens
    #[command(subcommand)]
    Location(LocationAction),

    /// Scan a post QR code to clock in or out
    Scan {
        /// Token read from the QR code
        qr_token: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Excuse yourself from today's duty
    Excuse {
        /// Reason, shown to the unit admin
        notes: String,
    },

    /// Your attendance across all schedules
    History,

    /// Close a schedule: mark missing members absent and fine them
    Close { schedule_id: ScheduleId },

    /// Fine settings and records
    #[command(subcommand)]
    Fine(FineAction),

    /// Recent audit events for your unit
    Audit {
        #[arg(short = 'n', long, default_value_t = DEFAULT_AUDIT_LIMIT)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleAction {
    /// Create a schedule
    Create {
        /// DAILY or WEEKLY
        #[arg(long)]
        cycle: CycleType,
        #[arg(long)]
        label: String,
        /// First duty day (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,
        /// Shift start (HH:MM)
        #[arg(long)]
        start_time: WallClock,
        /// Shift end (HH:MM), may be past midnight
        #[arg(long)]
        end_time: WallClock,
        /// Roster member, repeatable
        #[arg(short, long = "participant")]
        participants: Vec<String>,
    },

    /// Copy the latest schedule onto a new start date
    Clone {
        #[arg(long)]
        start_date: NaiveDate,
    },

    /// Change times, status or replace the roster
    Update {
        schedule_id: ScheduleId,
        #[arg(long)]
        start_time: Option<WallClock>,
        #[arg(long)]
        end_time: Option<WallClock>,
        #[arg(long)]
        status: Option<ScheduleStatus>,
        /// Replace the whole roster (comma separated)
        #[arg(long, value_delimiter = ',')]
        participants: Option<Vec<String>>,
    },

    Delete { schedule_id: ScheduleId },

    /// Show a schedule with its roster
    Show { schedule_id: ScheduleId },

    List,
}

#[derive(Subcommand, Debug)]
pub enum RosterAction {
    /// Add members; existing ones are kept as they are
    Add {
        schedule_id: ScheduleId,
        #[arg(required = true)]
        user_ids: Vec<String>,
    },

    Remove {
        schedule_id: ScheduleId,
        user_id: String,
    },

    List { schedule_id: ScheduleId },

    /// Set a member's status directly
    Override {
        schedule_id: ScheduleId,
        user_id: String,
        /// PENDING, PRESENT, EXCUSED or ABSENT
        status: ParticipantStatus,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LocationAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Geofence radius in meters (5 to 500)
        #[arg(long)]
        radius: Option<u32>,
    },

    /// Issue a new QR token with an expiry
    Rotate { location_id: LocationId },

    Update {
        location_id: LocationId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        #[arg(long)]
        radius: Option<u32>,
    },

    Delete { location_id: LocationId },

    List,
}

#[derive(Subcommand, Debug)]
pub enum FineAction {
    /// Configure the amount for a fine type
    Set(FineSettingArgs),

    /// Show configured fine settings
    Settings,

    List {
        #[arg(long)]
        user: Option<String>,
        /// PAID or UNPAID
        #[arg(long)]
        status: Option<FineStatus>,
    },

    /// Mark a fine paid and post it to the ledger
    Pay { fine_id: FineId },

    /// Fine the ABSENT, not yet fined members of a schedule without closing it
    Generate { schedule_id: ScheduleId },
}

#[derive(ClapArgs, Debug)]
pub struct FineSettingArgs {
    /// ABSENT, LATE or EARLY_LEAVE
    #[arg(long = "type")]
    pub fine_type: FineType,
    #[arg(long)]
    pub amount: Decimal,
    #[arg(long, default_value_t = 0)]
    pub tolerance_minutes: u32,
    /// Keep the setting but stop charging it
    #[arg(long)]
    pub inactive: bool,
}

fn users(ids: Vec<String>) -> Vec<UserId> {
    ids.into_iter().map(UserId::from).collect()
}

impl Action {
    /// Protocol command for this action, or None for actions served outside the protocol
    pub fn into_command(self) -> Option<Command> {
        let command = match self {
            Action::Schedule(action) => action.into_command(),
            Action::Roster(action) => action.into_command(),
            Action::Location(action) => action.into_command(),
            Action::Scan { qr_token, lat, lon } => Command::Scan(ScanRequest {
                qr_token,
                latitude: lat,
                longitude: lon,
            }),
            Action::Excuse { notes } => Command::SubmitExcuse { notes },
            Action::History => Command::AttendanceHistory,
            Action::Close { schedule_id } => Command::CloseSchedule { schedule_id },
            Action::Fine(action) => action.into_command(),
            Action::Audit { .. } => return None,
        };
        Some(command)
    }
}

impl ScheduleAction {
    fn into_command(self) -> Command {
        match self {
            ScheduleAction::Create {
                cycle,
                label,
                start_date,
                start_time,
                end_time,
                participants,
            } => Command::CreateSchedule(NewSchedule {
                cycle_type: cycle,
                shift_label: label,
                start_date,
                start_time,
                end_time,
                participant_ids: users(participants),
            }),
            ScheduleAction::Clone { start_date } => Command::CloneLatestSchedule {
                new_start_date: start_date,
            },
            ScheduleAction::Update {
                schedule_id,
                start_time,
                end_time,
                status,
                participants,
            } => Command::UpdateSchedule {
                schedule_id,
                update: ScheduleUpdate {
                    start_time,
                    end_time,
                    status,
                    participant_ids: participants.map(users),
                },
            },
            ScheduleAction::Delete { schedule_id } => Command::DeleteSchedule { schedule_id },
            ScheduleAction::Show { schedule_id } => Command::GetSchedule { schedule_id },
            ScheduleAction::List => Command::ListSchedules,
        }
    }
}

impl RosterAction {
    fn into_command(self) -> Command {
        match self {
            RosterAction::Add {
                schedule_id,
                user_ids,
            } => Command::AddParticipants {
                schedule_id,
                user_ids: users(user_ids),
            },
            RosterAction::Remove {
                schedule_id,
                user_id,
            } => Command::RemoveParticipant {
                schedule_id,
                user_id: user_id.into(),
            },
            RosterAction::List { schedule_id } => Command::ListParticipants { schedule_id },
            RosterAction::Override {
                schedule_id,
                user_id,
                status,
                notes,
            } => Command::OverrideParticipant {
                schedule_id,
                user_id: user_id.into(),
                status,
                notes,
            },
        }
    }
}

impl LocationAction {
    fn into_command(self) -> Command {
        match self {
            LocationAction::Create {
                name,
                lat,
                lon,
                radius,
            } => Command::CreateLocation(NewLocation {
                name,
                latitude: lat,
                longitude: lon,
                radius_meters: radius,
            }),
            LocationAction::Rotate { location_id } => Command::RotateToken { location_id },
            LocationAction::Update {
                location_id,
                name,
                lat,
                lon,
                radius,
            } => Command::UpdateLocation {
                location_id,
                update: LocationUpdate {
                    name,
                    latitude: lat,
                    longitude: lon,
                    radius_meters: radius,
                },
            },
            LocationAction::Delete { location_id } => Command::DeleteLocation { location_id },
            LocationAction::List => Command::ListLocations,
        }
    }
}

impl FineAction {
    fn into_command(self) -> Command {
        match self {
            FineAction::Set(args) => Command::UpsertFineSettings {
                settings: vec![FineSettingInput {
                    fine_type: args.fine_type,
                    amount: args.amount,
                    tolerance_minutes: args.tolerance_minutes,
                    is_active: !args.inactive,
                }],
            },
            FineAction::Settings => Command::ListFineSettings,
            FineAction::List { user, status } => Command::ListFines {
                filter: FineFilter {
                    user_id: user.map(UserId::from),
                    status,
                },
            },
            FineAction::Pay { fine_id } => Command::MarkFinePaid { fine_id },
            FineAction::Generate { schedule_id } => Command::GenerateFines { schedule_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        action: Action,
    }

    fn parse(args: &[&str]) -> Action {
        let mut argv = vec!["ronda"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().action
    }

    #[test]
    fn create_schedule_maps_every_field() {
        let action = parse(&[
            "schedule",
            "create",
            "--cycle",
            "weekly",
            "--label",
            "Night Shift",
            "--start-date",
            "2024-01-01",
            "--start-time",
            "22:00",
            "--end-time",
            "04:00",
            "-p",
            "alice",
            "-p",
            "bob",
        ]);

        match action.into_command() {
            Some(Command::CreateSchedule(new)) => {
                assert_eq!(new.cycle_type, CycleType::Weekly);
                assert_eq!(new.shift_label, "Night Shift");
                assert_eq!(new.end_time, WallClock::new(4, 0).unwrap());
                assert_eq!(new.participant_ids, vec![UserId::new("alice"), UserId::new("bob")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn scan_accepts_negative_coordinates() {
        let action = parse(&["scan", "tok123", "--lat", "-6.2088", "--lon", "106.8456"]);
        match action.into_command() {
            Some(Command::Scan(request)) => {
                assert_eq!(request.qr_token, "tok123");
                assert_eq!(request.latitude, -6.2088);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn update_replaces_roster_from_list() {
        let id = ScheduleId::new().to_string();
        let action = parse(&["schedule", "update", &id, "--participants", "a,b,c"]);
        match action.into_command() {
            Some(Command::UpdateSchedule { update, .. }) => {
                assert_eq!(update.participant_ids.map(|p| p.len()), Some(3));
                assert!(update.status.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn inactive_flag_disables_setting() {
        let action = parse(&["fine", "set", "--type", "absent", "--amount", "25000", "--inactive"]);
        match action.into_command() {
            Some(Command::UpsertFineSettings { settings }) => {
                assert_eq!(settings[0].fine_type, FineType::Absent);
                assert_eq!(settings[0].amount, Decimal::from(25000));
                assert!(!settings[0].is_active);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn fine_generate_targets_schedule() {
        let id = ScheduleId::new();
        let action = parse(&["fine", "generate", &id.to_string()]);
        match action.into_command() {
            Some(Command::GenerateFines { schedule_id }) => assert_eq!(schedule_id, id),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn audit_is_not_a_protocol_command() {
        assert!(parse(&["audit", "-n", "5"]).into_command().is_none());
    }

    #[test]
    fn bad_schedule_id_is_rejected() {
        assert!(TestCli::try_parse_from(["ronda", "close", "not-a-uuid"]).is_err());
    }
}
