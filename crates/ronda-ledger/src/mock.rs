//! Mock ledger for testing

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::{FinePosting, Ledger, LedgerError, LedgerReceipt, LedgerResult};

/// In-memory ledger that records every accepted posting
pub struct MockLedger {
    next_id: AtomicU64,
    postings: Arc<Mutex<Vec<FinePosting>>>,

    /// Configure posting to fail
    pub fail_post: Arc<Mutex<bool>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            postings: Arc::new(Mutex::new(Vec::new())),
            fail_post: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_fail_post(&self, fail: bool) {
        *self.fail_post.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Postings accepted so far
    pub fn postings(&self) -> Vec<FinePosting> {
        self.postings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MockLedger {
    fn post_fine(&self, posting: &FinePosting) -> LedgerResult<LedgerReceipt> {
        if *self.fail_post.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(LedgerError::Unavailable("Mock posting failure".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.postings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(posting.clone());

        Ok(LedgerReceipt {
            receipt_id: format!("mock-{id}"),
        })
    }
}
