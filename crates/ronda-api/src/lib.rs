//! Data model and protocol types for ronda
//!
//! This crate defines the stable surface between the patrol core and its callers:
//! - Entities (duty schedules, participants, post locations, fine settings and records)
//! - Closed status enums
//! - Commands (requests) and responses with structured error codes
//! - Versioning

mod commands;
mod types;

pub use commands::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
