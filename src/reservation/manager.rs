use crate::{
    error::InventoryError,
    ledger::ledger::Ledger,
    stock::{Hold, HoldState, StockKey},
};
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use uuid::Uuid;

/// Which terminal transition a hold is being driven to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finalize {
    Commit,
    Release,
    Expire,
}

impl Finalize {
    fn target(self) -> HoldState {
        match self {
            Finalize::Commit => HoldState::Committed,
            Finalize::Release => HoldState::Released,
            Finalize::Expire => HoldState::Expired,
        }
    }

    /// Ledger effect of the winning transition. Commit consumes the held
    /// quantity; release and expiry return it to available.
    fn deltas(self, quantity: u64) -> (i64, i64) {
        let q = quantity as i64;
        match self {
            Finalize::Commit => (0, -q),
            Finalize::Release | Finalize::Expire => (q, -q),
        }
    }
}

/// Owns the hold table and the expiry-deadline index. Callers serialize
/// per stock key; the atomic state tag settles any race that remains.
pub struct ReservationManager<L: Ledger> {
    ledger: Arc<L>,
    holds: DashMap<Uuid, Arc<Hold>>,
    deadlines: SkipMap<(Instant, Uuid), ()>,
    retention: Duration,
}

impl<L: Ledger> ReservationManager<L> {
    pub fn new(ledger: Arc<L>, retention: Duration) -> Self {
        Self {
            ledger,
            holds: DashMap::new(),
            deadlines: SkipMap::new(),
            retention,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Hold>> {
        self.holds.get(&id).map(|hold| hold.clone())
    }

    /// Move quantity from available to reserved and record the hold. On a
    /// ledger refusal nothing is left behind.
    pub async fn create(
        &self,
        key: StockKey,
        quantity: u64,
        ttl: Duration,
        idempotency_key: Option<Arc<str>>,
    ) -> Result<Arc<Hold>, InventoryError> {
        let hold = Arc::new(Hold::new(key.clone(), quantity, ttl, idempotency_key));
        self.holds.insert(hold.id, hold.clone());

        match self
            .ledger
            .apply(&key, -(quantity as i64), quantity as i64)
            .await
        {
            Ok(_) => {
                // the id has not been handed out yet, so nothing can race this
                let _ = hold.transition(HoldState::Pending, HoldState::Reserved);
                self.deadlines.insert((hold.expires, hold.id), ());
                Ok(hold)
            }
            Err(e) => {
                self.holds.remove(&hold.id);
                Err(e)
            }
        }
    }

    /// Drive a hold to a terminal state. The compare-and-transition on the
    /// state tag decides the winner; the winner applies the ledger effect.
    /// Repeating an already-won transition succeeds silently; a conflicting
    /// one reports `AlreadyFinalized`.
    pub async fn finalize(&self, id: Uuid, how: Finalize) -> Result<Arc<Hold>, InventoryError> {
        let hold = self.get(id).ok_or_else(|| InventoryError::no_reservation(id))?;

        if how == Finalize::Expire && Instant::now() < hold.expires {
            return Err(InventoryError::InvalidState {
                id,
                state: hold.state(),
            });
        }

        let target = how.target();
        match hold.transition(HoldState::Reserved, target) {
            Ok(()) => {
                let (delta_available, delta_reserved) = how.deltas(hold.quantity);
                match self
                    .ledger
                    .apply(&hold.key, delta_available, delta_reserved)
                    .await
                {
                    Ok(_) => {
                        let _ = hold.finalized_at.set(Instant::now());
                        Ok(hold.clone())
                    }
                    Err(e) => {
                        // the write was refused; put the hold back
                        hold.revert(HoldState::Reserved);
                        Err(e)
                    }
                }
            }
            Err(state) if state == target => Ok(hold.clone()),
            Err(state) if state.is_terminal() => Err(InventoryError::AlreadyFinalized { id, state }),
            Err(state) => Err(InventoryError::InvalidState { id, state }),
        }
    }

    /// Pop every deadline that has passed. The caller expires each id
    /// through the normal finalize path.
    pub fn due(&self, now: Instant) -> Vec<Uuid> {
        let mut out = Vec::new();
        while let Some(entry) = self.deadlines.front() {
            let (deadline, id) = *entry.key();
            if deadline > now {
                break;
            }
            entry.remove();
            out.push(id);
        }
        out
    }

    /// Put an elapsed hold back on the sweep queue after a failed expiry.
    pub fn reschedule(&self, id: Uuid) {
        if let Some(hold) = self.get(id) {
            if !hold.state().is_terminal() {
                self.deadlines.insert((hold.expires, id), ());
            }
        }
    }

    /// Drop terminal holds once they have outlived the retention window.
    pub fn purge(&self, now: Instant) {
        self.holds.retain(|_, hold| match hold.finalized_at.get() {
            Some(done) => now.duration_since(*done) < self.retention,
            None => true,
        });
    }
}
