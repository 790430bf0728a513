//! Ledger traits

use chrono::{DateTime, Local};
use ronda_util::{FineId, UnitId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger rejected posting: {0}")]
    Rejected(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// What a ledger transaction is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerCategory {
    Fine,
}

/// Money flow relative to the unit's treasury
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerDirection {
    In,
}

/// One inbound transaction recording a paid fine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinePosting {
    pub unit_id: UnitId,
    pub fine_id: FineId,
    pub category: LedgerCategory,
    pub direction: LedgerDirection,
    pub amount: Decimal,
    pub description: String,
    pub posted_at: DateTime<Local>,
}

impl FinePosting {
    /// An inbound `FINE` transaction
    pub fn inbound(
        unit_id: UnitId,
        fine_id: FineId,
        amount: Decimal,
        description: impl Into<String>,
        posted_at: DateTime<Local>,
    ) -> Self {
        Self {
            unit_id,
            fine_id,
            category: LedgerCategory::Fine,
            direction: LedgerDirection::In,
            amount,
            description: description.into(),
            posted_at,
        }
    }
}

/// Proof that the ledger accepted a posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub receipt_id: String,
}

/// The external ledger.
///
/// Implementations must either record the posting and return a receipt,
/// or record nothing and return an error.
pub trait Ledger: Send + Sync {
    fn post_fine(&self, posting: &FinePosting) -> LedgerResult<LedgerReceipt>;
}
