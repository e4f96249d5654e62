use crate::{
    error::InventoryError,
    stock::{StockKey, StockLevels},
};
use async_trait::async_trait;

/// Authoritative stock store. All mutations for one key are totally
/// ordered; independent keys proceed concurrently.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Apply both deltas as one unit. Rejects with no partial effect if
    /// either count would go negative.
    async fn apply(
        &self,
        key: &StockKey,
        delta_available: i64,
        delta_reserved: i64,
    ) -> Result<StockLevels, InventoryError>;

    /// Consistent snapshot read; never observes a half-applied mutation.
    async fn read(&self, key: &StockKey) -> Result<StockLevels, InventoryError>;

    /// Manual stock correction after a physical count. Touches `available`
    /// only and is audited with the supplied reason. A positive delta on an
    /// unknown key creates the record.
    async fn adjust(
        &self,
        key: &StockKey,
        delta: i64,
        reason: &str,
    ) -> Result<StockLevels, InventoryError>;
}
