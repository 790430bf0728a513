//! Ledger-posting collaborator for ronda
//!
//! The patrol core never owns money. Paying a fine posts one inbound
//! transaction to the unit's ledger through the [`Ledger`] trait defined
//! here. This crate ships a JSON-lines journal implementation and a mock.

mod journal;
mod mock;
mod traits;

pub use journal::*;
pub use mock::*;
pub use traits::*;
