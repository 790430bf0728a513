//! Patrol duty core for ronda
//!
//! This crate is the heart of ronda, containing:
//! - Duty schedule lifecycle (create, clone, update, close)
//! - Roster assignment and the participant state machine
//!   (PENDING -> PRESENT / EXCUSED / ABSENT)
//! - Post locations with rotating QR tokens
//! - The geofenced scan protocol (token, distance, shift window)
//! - Fine generation and payment through the ledger collaborator
//!
//! Every operation runs in one store transaction and takes the caller's
//! [`Identity`](ronda_api::Identity) explicitly. Time comes from the
//! injected [`Clock`](ronda_util::Clock).

mod attendance;
mod closer;
mod error;
mod excuse;
mod fines;
mod locations;
mod participant;
mod roster;
mod schedules;
mod service;

pub use attendance::*;
pub use error::*;
pub use fines::*;
pub use locations::*;
pub use participant::*;
pub use schedules::*;
pub use service::*;
