use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::shared::entities::{TransferOutcome, TransferStatus};

const MAX_RECORDS_PER_KEY: usize = 8;
/// Keys kept by the in-memory ledger; the least recently touched key is
/// evicted beyond this.
pub const DEFAULT_MAX_KEYS: usize = 1024;

/// Correlation key for a handoff. The refer callback carries only these two
/// values, so the outcome is matched on them rather than on a live session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferKey {
    pub chat_id: String,
    pub destination: String,
}

impl TransferKey {
    pub fn new(chat_id: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            destination: destination.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub status: TransferStatus,
    pub call_sid: Option<String>,
    pub outcome: Option<TransferOutcome>,
    pub at: DateTime<Utc>,
}

/// Keyed store for handoff requests and their asynchronous outcomes.
/// A multi-instance deployment swaps the in-memory adapter for a shared one.
pub trait TransferLedger: Send + Sync {
    fn record_requested(&self, key: &TransferKey, call_sid: &str);
    /// The call update was not accepted, so no outcome callback will arrive.
    fn record_request_failed(&self, key: &TransferKey, call_sid: &str);
    fn record_outcome(&self, key: &TransferKey, outcome: &TransferOutcome) -> TransferStatus;
    fn history(&self, key: &TransferKey) -> Vec<TransferRecord>;

    fn latest(&self, key: &TransferKey) -> Option<TransferRecord> {
        self.history(key).pop()
    }
}

#[derive(Default)]
struct LedgerState {
    entries: HashMap<TransferKey, KeyEntry>,
    next_seq: u64,
}

#[derive(Default)]
struct KeyEntry {
    records: Vec<TransferRecord>,
    last_seq: u64,
}

/// Process-local ledger. History is bounded per key and the number of keys
/// is bounded by `max_keys`.
#[derive(Clone)]
pub struct InMemoryTransferLedger {
    inner: Arc<Mutex<LedgerState>>,
    max_keys: usize,
}

impl Default for InMemoryTransferLedger {
    fn default() -> Self {
        Self::with_max_keys(DEFAULT_MAX_KEYS)
    }
}

impl InMemoryTransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerState::default())),
            max_keys: max_keys.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, key: &TransferKey, record: TransferRecord) {
        let mut state = self.lock();
        if !state.entries.contains_key(key) && state.entries.len() >= self.max_keys {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_seq)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        let entry = state.entries.entry(key.clone()).or_default();
        entry.last_seq = seq;
        entry.records.push(record);
        if entry.records.len() > MAX_RECORDS_PER_KEY {
            let excess = entry.records.len() - MAX_RECORDS_PER_KEY;
            entry.records.drain(..excess);
        }
    }

    fn last_call_sid(&self, key: &TransferKey) -> Option<String> {
        self.lock().entries.get(key).and_then(|entry| {
            entry
                .records
                .iter()
                .rev()
                .find_map(|r| r.call_sid.clone())
        })
    }
}

impl TransferLedger for InMemoryTransferLedger {
    fn record_requested(&self, key: &TransferKey, call_sid: &str) {
        self.push(
            key,
            TransferRecord {
                status: TransferStatus::Requested,
                call_sid: Some(call_sid.to_string()),
                outcome: None,
                at: Utc::now(),
            },
        );
    }

    fn record_request_failed(&self, key: &TransferKey, call_sid: &str) {
        self.push(
            key,
            TransferRecord {
                status: TransferStatus::RequestFailed,
                call_sid: Some(call_sid.to_string()),
                outcome: None,
                at: Utc::now(),
            },
        );
    }

    fn record_outcome(&self, key: &TransferKey, outcome: &TransferOutcome) -> TransferStatus {
        let status = outcome.status();
        // 発信元の接続が既に閉じていても記録だけは残す
        let call_sid = self.last_call_sid(key);
        self.push(
            key,
            TransferRecord {
                status,
                call_sid,
                outcome: Some(outcome.clone()),
                at: Utc::now(),
            },
        );
        status
    }

    fn history(&self, key: &TransferKey) -> Vec<TransferRecord> {
        self.lock()
            .entries
            .get(key)
            .map(|entry| entry.records.clone())
            .unwrap_or_default()
    }
}
