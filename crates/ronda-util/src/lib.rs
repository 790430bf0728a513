//! Shared utilities for ronda
//!
//! This crate provides:
//! - ID types (UnitId, UserId, ScheduleId, LocationId, FineId)
//! - Time utilities (mock-able wall clock, shift windows, the `Clock` capability)
//! - Great-circle distance for geofence checks
//! - Default paths for config and data directories

mod geo;
mod ids;
mod paths;
mod time;

pub use geo::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
