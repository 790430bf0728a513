//! Append-only JSON-lines ledger journal

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{FinePosting, Ledger, LedgerError, LedgerReceipt, LedgerResult};

/// One line of the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub receipt_id: String,
    #[serde(flatten)]
    pub posting: FinePosting,
}

/// Ledger that appends each posting as a JSON line to a file.
///
/// A line is only considered posted once it has been flushed and synced.
pub struct JournalLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JournalLedger {
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Fail early if the file cannot be created
        OpenOptions::new().create(true).append(true).open(&path)?;

        info!(path = %path.display(), "Ledger journal opened");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back, oldest first
    pub fn entries(&self) -> LedgerResult<Vec<JournalEntry>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

impl Ledger for JournalLedger {
    fn post_fine(&self, posting: &FinePosting) -> LedgerResult<LedgerReceipt> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LedgerError::Unavailable("journal lock poisoned".into()))?;

        let entry = JournalEntry {
            receipt_id: Uuid::new_v4().to_string(),
            posting: posting.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        debug!(
            receipt_id = %entry.receipt_id,
            unit_id = %posting.unit_id,
            fine_id = %posting.fine_id,
            amount = %posting.amount,
            "Fine posted to ledger journal"
        );

        Ok(LedgerReceipt {
            receipt_id: entry.receipt_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LedgerCategory, LedgerDirection};
    use chrono::Local;
    use ronda_util::{FineId, UnitId};
    use rust_decimal::Decimal;

    #[test]
    fn appends_one_line_per_posting() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JournalLedger::open(dir.path().join("nested").join("ledger.jsonl")).unwrap();

        let posting = FinePosting::inbound(
            UnitId::new("rt-05"),
            FineId::new(),
            Decimal::from(50000),
            "Patrol absence fine",
            Local::now(),
        );
        let receipt = ledger.post_fine(&posting).unwrap();
        ledger.post_fine(&posting).unwrap();

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].receipt_id, receipt.receipt_id);
        assert_eq!(entries[0].posting, posting);
    }

    #[test]
    fn journal_lines_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JournalLedger::open(dir.path().join("ledger.jsonl")).unwrap();
        let posting = FinePosting::inbound(
            UnitId::new("rt-05"),
            FineId::new(),
            Decimal::new(1250, 2),
            "fine",
            Local::now(),
        );
        assert_eq!(posting.category, LedgerCategory::Fine);
        assert_eq!(posting.direction, LedgerDirection::In);
        ledger.post_fine(&posting).unwrap();

        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(value["category"], "FINE");
        assert_eq!(value["direction"], "IN");
        assert_eq!(value["amount"], "12.50");
    }
}
