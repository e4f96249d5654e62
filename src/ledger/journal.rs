use crate::stock::StockKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal write failed: {0}")]
    Write(String),
}

/// One acknowledged mutation. Appended before the in-memory record is
/// updated; a mutation whose append fails is never applied.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    Apply {
        sku: String,
        location: String,
        delta_available: i64,
        delta_reserved: i64,
        at: DateTime<Utc>,
    },
    Adjust {
        sku: String,
        location: String,
        delta: i64,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl JournalEntry {
    pub fn apply(key: &StockKey, delta_available: i64, delta_reserved: i64) -> Self {
        Self::Apply {
            sku: key.sku.to_string(),
            location: key.location.to_string(),
            delta_available,
            delta_reserved,
            at: Utc::now(),
        }
    }

    pub fn adjust(key: &StockKey, delta: i64, reason: &str) -> Self {
        Self::Adjust {
            sku: key.sku.to_string(),
            location: key.location.to_string(),
            delta,
            reason: reason.to_string(),
            at: Utc::now(),
        }
    }
}

/// Durable write path the ledger acknowledges through. Storage engines are
/// someone else's problem; this trait is the boundary.
pub trait Journal: Send + Sync + 'static {
    fn append(&self, entry: &JournalEntry) -> Result<(), JournalError>;
}

/// Keeps entries in memory. Good enough for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl InMemoryJournal {
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Journal for InMemoryJournal {
    fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| JournalError::Write("journal mutex poisoned".to_string()))?;
        entries.push(entry.clone());
        Ok(())
    }
}
