use crate::stock::StockLevels;
use dashmap::{DashMap, mapref::entry::Entry};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use uuid::Uuid;

/// Outcome recorded for a mutating operation that actually touched the
/// ledger. Failed attempts leave no record, so a retry may succeed later.
#[derive(Clone, Debug)]
pub enum StoredOutcome {
    Reserved { reservation_id: Uuid },
    Adjusted { levels: StockLevels },
}

#[derive(Debug)]
struct IdempotencyRecord {
    outcome: Option<StoredOutcome>,
    recorded_at: Instant,
}

/// Result of trying to claim a caller-supplied key.
pub enum Claim {
    /// First use; the caller now owns the key and must complete or abandon.
    Fresh,
    /// A duplicate is still executing.
    InFlight,
    /// The operation already ran; here is what it did.
    Replayed(StoredOutcome),
}

/// Caller-token table guarding retried requests against double-apply.
/// First claimant wins; records are evicted after the retention window.
pub struct IdempotencyTable {
    entries: DashMap<Arc<str>, IdempotencyRecord>,
    retention: Duration,
}

impl IdempotencyTable {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retention,
        }
    }

    pub fn claim(&self, key: Arc<str>) -> Claim {
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => match &occupied.get().outcome {
                Some(outcome) => Claim::Replayed(outcome.clone()),
                None => Claim::InFlight,
            },
            Entry::Vacant(vacant) => {
                vacant.insert(IdempotencyRecord {
                    outcome: None,
                    recorded_at: Instant::now(),
                });
                Claim::Fresh
            }
        }
    }

    pub fn complete(&self, key: &str, outcome: StoredOutcome) {
        if let Some(mut record) = self.entries.get_mut(key) {
            record.outcome = Some(outcome);
            record.recorded_at = Instant::now();
        }
    }

    /// Forget a claim whose operation did not apply anything.
    pub fn abandon(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Evict records (completed or stranded in-flight) past retention.
    pub fn purge(&self, now: Instant) {
        self.entries
            .retain(|_, record| now.duration_since(record.recorded_at) < self.retention);
    }
}
