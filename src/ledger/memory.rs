use super::{
    journal::{Journal, JournalEntry},
    ledger::Ledger,
};
use crate::{
    error::InventoryError,
    stock::{StockKey, StockLevels, StockRecord},
};
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use tracing::info;

/// DashMap-backed ledger. Each mutation runs as a read-modify-write under
/// the map's per-shard write guard, so applies on one key never interleave
/// while independent keys stay concurrent.
pub struct InMemoryLedger {
    records: DashMap<StockKey, StockRecord>,
    journal: Arc<dyn Journal>,
}

impl InMemoryLedger {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self {
            records: DashMap::new(),
            journal,
        }
    }

    fn shifted(current: u64, delta: i64) -> Option<u64> {
        if delta >= 0 {
            current.checked_add(delta as u64)
        } else {
            current.checked_sub(delta.unsigned_abs())
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn apply(
        &self,
        key: &StockKey,
        delta_available: i64,
        delta_reserved: i64,
    ) -> Result<StockLevels, InventoryError> {
        let Some(mut record) = self.records.get_mut(key) else {
            return Err(InventoryError::no_stock(key));
        };

        let available = match Self::shifted(record.available, delta_available) {
            Some(v) => v,
            None if delta_available < 0 => {
                return Err(InventoryError::insufficient(
                    key,
                    delta_available.unsigned_abs(),
                    record.available,
                ));
            }
            None => {
                return Err(InventoryError::Internal(format!(
                    "available count overflow for {key}"
                )));
            }
        };
        let reserved = match Self::shifted(record.reserved, delta_reserved) {
            Some(v) => v,
            None if delta_reserved < 0 => {
                return Err(InventoryError::Internal(format!(
                    "reserved count underflow for {key}"
                )));
            }
            None => {
                return Err(InventoryError::Internal(format!(
                    "reserved count overflow for {key}"
                )));
            }
        };

        self.journal
            .append(&JournalEntry::apply(key, delta_available, delta_reserved))
            .map_err(|e| InventoryError::Unavailable(e.to_string()))?;

        record.available = available;
        record.reserved = reserved;
        Ok(record.levels())
    }

    async fn read(&self, key: &StockKey) -> Result<StockLevels, InventoryError> {
        self.records
            .get(key)
            .map(|record| record.levels())
            .ok_or_else(|| InventoryError::no_stock(key))
    }

    async fn adjust(
        &self,
        key: &StockKey,
        delta: i64,
        reason: &str,
    ) -> Result<StockLevels, InventoryError> {
        let levels = match self.records.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                let available = match Self::shifted(record.available, delta) {
                    Some(v) => v,
                    None if delta < 0 => {
                        return Err(InventoryError::insufficient(
                            key,
                            delta.unsigned_abs(),
                            record.available,
                        ));
                    }
                    None => {
                        return Err(InventoryError::Internal(format!(
                            "available count overflow for {key}"
                        )));
                    }
                };
                self.journal
                    .append(&JournalEntry::adjust(key, delta, reason))
                    .map_err(|e| InventoryError::Unavailable(e.to_string()))?;
                record.available = available;
                record.levels()
            }
            Entry::Vacant(vacant) => {
                // a positive count on an unseen key brings it into stock
                if delta < 0 {
                    return Err(InventoryError::no_stock(key));
                }
                self.journal
                    .append(&JournalEntry::adjust(key, delta, reason))
                    .map_err(|e| InventoryError::Unavailable(e.to_string()))?;
                vacant
                    .insert(StockRecord {
                        available: delta as u64,
                        reserved: 0,
                    })
                    .levels()
            }
        };

        info!(
            sku = %key.sku,
            location = %key.location,
            delta,
            reason,
            available = levels.available,
            reserved = levels.reserved,
            "stock adjusted"
        );
        Ok(levels)
    }
}
