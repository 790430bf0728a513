//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Process-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Scan protocol knobs
    #[serde(default)]
    pub attendance: RawAttendanceConfig,

    /// Fine defaults used when a unit has not configured its own
    #[serde(default)]
    pub fines: RawFinesConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store (default: `$XDG_DATA_HOME/ronda`)
    pub data_dir: Option<PathBuf>,

    /// Ledger journal file (default: `<data_dir>/ledger.jsonl`)
    pub ledger_journal: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAttendanceConfig {
    /// Lifetime of a rotated QR token, in hours
    pub token_ttl_hours: Option<i64>,

    /// Geofence radius for posts created without one
    pub default_radius_meters: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFinesConfig {
    /// ABSENT fine amount when no active unit setting exists.
    /// Kept as a string so TOML floats never touch money.
    pub default_absent_amount: Option<String>,
}
