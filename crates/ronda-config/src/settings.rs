//! Validated settings

use crate::schema::{RawAttendanceConfig, RawConfig, RawFinesConfig, RawServiceConfig};
use crate::validation::parse_amount;
use chrono::Duration;
use ronda_api::DEFAULT_RADIUS_METERS;
use ronda_util::{DATABASE_FILENAME, LEDGER_JOURNAL_FILENAME, default_data_dir};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Token lifetime applied by rotation when not configured
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// ABSENT fine amount when a unit has no active setting
pub const DEFAULT_ABSENT_AMOUNT: i64 = 50_000;

/// Validated settings ready for use by the patrol core
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub service: ServiceSettings,
    pub attendance: AttendanceSettings,
    pub fines: FineDefaults,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceSettings::from_raw(raw.service),
            attendance: AttendanceSettings::from_raw(raw.attendance),
            fines: FineDefaults::from_raw(raw.fines),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_raw(RawConfig {
            config_version: crate::CURRENT_CONFIG_VERSION,
            service: RawServiceConfig::default(),
            attendance: RawAttendanceConfig::default(),
            fines: RawFinesConfig::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub data_dir: PathBuf,
    pub ledger_journal: PathBuf,
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let data_dir = raw.data_dir.unwrap_or_else(default_data_dir);
        let ledger_journal = raw
            .ledger_journal
            .unwrap_or_else(|| data_dir.join(LEDGER_JOURNAL_FILENAME));
        Self {
            data_dir,
            ledger_journal,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILENAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendanceSettings {
    /// How long a rotated token stays valid
    pub token_ttl: Duration,
    pub default_radius_meters: u32,
}

impl AttendanceSettings {
    fn from_raw(raw: RawAttendanceConfig) -> Self {
        Self {
            token_ttl: Duration::hours(raw.token_ttl_hours.unwrap_or(DEFAULT_TOKEN_TTL_HOURS)),
            default_radius_meters: raw.default_radius_meters.unwrap_or(DEFAULT_RADIUS_METERS),
        }
    }
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self::from_raw(RawAttendanceConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FineDefaults {
    pub default_absent_amount: Decimal,
}

impl FineDefaults {
    fn from_raw(raw: RawFinesConfig) -> Self {
        let default_absent_amount = raw
            .default_absent_amount
            .as_deref()
            .and_then(|s| parse_amount(s).ok())
            .unwrap_or_else(|| Decimal::from(DEFAULT_ABSENT_AMOUNT));
        Self {
            default_absent_amount,
        }
    }
}

impl Default for FineDefaults {
    fn default() -> Self {
        Self::from_raw(RawFinesConfig::default())
    }
}
