use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU8, Ordering},
    },
    time::{Duration, Instant},
};
use uuid::Uuid;

/// (SKU, location) pair identifying one stock record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StockKey {
    pub sku: Arc<str>,
    pub location: Arc<str>,
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.sku, self.location)
    }
}

/// Snapshot of one stock record as returned to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub available: u64,
    pub reserved: u64,
}

/// Authoritative per-key quantities, owned by the ledger store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockRecord {
    pub available: u64,
    pub reserved: u64,
}

impl StockRecord {
    pub fn levels(&self) -> StockLevels {
        StockLevels {
            available: self.available,
            reserved: self.reserved,
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldState {
    /// Transient, only while a hold is being created.
    Pending = 0,
    Reserved = 1,
    Committed = 2,
    Released = 3,
    Expired = 4,
}

impl HoldState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => HoldState::Pending,
            1 => HoldState::Reserved,
            2 => HoldState::Committed,
            3 => HoldState::Released,
            4 => HoldState::Expired,
            _ => unreachable!("invalid hold state tag {v}"),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HoldState::Committed | HoldState::Released | HoldState::Expired
        )
    }
}

impl fmt::Display for HoldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HoldState::Pending => "pending",
            HoldState::Reserved => "reserved",
            HoldState::Committed => "committed",
            HoldState::Released => "released",
            HoldState::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A claim on stock that keeps quantity out of `available` until it is
/// committed, released, or expired. Transitions race through the atomic
/// state tag; exactly one terminal transition can win.
#[derive(Debug)]
pub struct Hold {
    pub id: Uuid,
    pub key: StockKey,
    pub quantity: u64,
    state: AtomicU8,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expires: Instant,
    pub idempotency_key: Option<Arc<str>>,
    pub(crate) finalized_at: OnceLock<Instant>,
}

impl Hold {
    pub fn new(
        key: StockKey,
        quantity: u64,
        ttl: Duration,
        idempotency_key: Option<Arc<str>>,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            quantity,
            state: AtomicU8::new(HoldState::Pending as u8),
            created_at,
            expires_at: created_at + chrono::Duration::seconds(ttl.as_secs() as i64),
            expires: Instant::now() + ttl,
            idempotency_key,
            finalized_at: OnceLock::new(),
        }
    }

    pub fn state(&self) -> HoldState {
        HoldState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Compare-and-transition; on failure reports the state that won.
    pub(crate) fn transition(&self, from: HoldState, to: HoldState) -> Result<(), HoldState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(HoldState::from_u8)
    }

    pub(crate) fn revert(&self, to: HoldState) {
        self.state.store(to as u8, Ordering::Release);
    }
}

/// Wire-facing view of a hold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReservationView {
    pub reservation_id: Uuid,
    pub sku: String,
    pub location: String,
    pub quantity: u64,
    pub state: HoldState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Hold> for ReservationView {
    fn from(hold: &Hold) -> Self {
        Self {
            reservation_id: hold.id,
            sku: hold.key.sku.to_string(),
            location: hold.key.location.to_string(),
            quantity: hold.quantity,
            state: hold.state(),
            created_at: hold.created_at,
            expires_at: hold.expires_at,
        }
    }
}
