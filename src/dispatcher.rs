use crate::{
    config::Config,
    error::InventoryError,
    ledger::ledger::Ledger,
    reservation::{
        idempotency::{Claim, IdempotencyTable, StoredOutcome},
        manager::{Finalize, ReservationManager},
    },
    stock::{Hold, StockKey, StockLevels},
};
use dashmap::DashMap;
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::{sleep, timeout},
};
use tracing::{info, trace, warn};
use uuid::Uuid;

const MAX_IDENT_LEN: usize = 64;

/// Service façade the transport handlers call. Validates request shape
/// before touching shared state, serializes mutating operations per stock
/// key, and bounds every mutation with the configured timeout. A timed-out
/// operation still runs to completion underneath; it is never left half
/// applied, and the caller retries with its idempotency key.
pub struct Inventory<L: Ledger> {
    ledger: Arc<L>,
    holds: Arc<ReservationManager<L>>,
    locks: Arc<DashMap<StockKey, Arc<Mutex<()>>>>,
    idempotency: Arc<IdempotencyTable>,
    op_timeout: Duration,
    max_ttl: Duration,
}

impl<L: Ledger> Clone for Inventory<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            holds: self.holds.clone(),
            locks: self.locks.clone(),
            idempotency: self.idempotency.clone(),
            op_timeout: self.op_timeout,
            max_ttl: self.max_ttl,
        }
    }
}

impl<L: Ledger> Inventory<L> {
    pub fn new(ledger: Arc<L>, config: Config) -> Self {
        let inventory = Self {
            holds: Arc::new(ReservationManager::new(ledger.clone(), config.retention)),
            ledger,
            locks: Arc::new(DashMap::new()),
            idempotency: Arc::new(IdempotencyTable::new(config.retention)),
            op_timeout: config.op_timeout,
            max_ttl: config.max_ttl,
        };

        // sweeper task
        let sweeper = inventory.clone();
        tokio::spawn(async move {
            loop {
                // sleep first
                sleep(config.sweep_interval).await;
                sweeper.sweep(Instant::now()).await;
            }
        });

        inventory
    }

    pub async fn get_stock(
        &self,
        sku: &str,
        location: &str,
    ) -> Result<StockLevels, InventoryError> {
        let key = stock_key(sku, location)?;
        self.ledger.read(&key).await
    }

    pub fn reservation(&self, id: Uuid) -> Result<Arc<Hold>, InventoryError> {
        self.holds
            .get(id)
            .ok_or_else(|| InventoryError::no_reservation(id))
    }

    pub async fn reserve(
        &self,
        sku: &str,
        location: &str,
        quantity: u64,
        ttl_seconds: u64,
        idempotency_key: Option<&str>,
    ) -> Result<Arc<Hold>, InventoryError> {
        let key = stock_key(sku, location)?;
        if quantity == 0 {
            return Err(InventoryError::Validation(
                "Quantity must be positive".to_string(),
            ));
        }
        let ttl = self.ttl(ttl_seconds)?;
        let token = idempotency_key
            .map(|k| ident(k, "Idempotency key"))
            .transpose()?;

        if let Some(token) = &token {
            match self.idempotency.claim(token.clone()) {
                Claim::Replayed(StoredOutcome::Reserved { reservation_id }) => {
                    return self.reservation(reservation_id);
                }
                Claim::Replayed(_) => {
                    return Err(InventoryError::Validation(
                        "Idempotency key was already used by a different operation".to_string(),
                    ));
                }
                Claim::InFlight => return Err(InventoryError::Timeout),
                Claim::Fresh => {}
            }
        }

        let this = self.clone();
        let task_token = token.clone();
        self.bounded(async move {
            let _guard = this.lock_key(&key).await;
            match this
                .holds
                .create(key, quantity, ttl, task_token.clone())
                .await
            {
                Ok(hold) => {
                    if let Some(token) = &task_token {
                        this.idempotency.complete(
                            token,
                            StoredOutcome::Reserved {
                                reservation_id: hold.id,
                            },
                        );
                    }
                    Ok(hold)
                }
                Err(e) => {
                    if let Some(token) = &task_token {
                        this.idempotency.abandon(token);
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    pub async fn commit(&self, id: Uuid) -> Result<Arc<Hold>, InventoryError> {
        self.finalize(id, Finalize::Commit).await
    }

    pub async fn release(&self, id: Uuid) -> Result<Arc<Hold>, InventoryError> {
        self.finalize(id, Finalize::Release).await
    }

    /// Also invoked by the sweeper; callers racing it settle on the state
    /// tag, so losing here is routine.
    pub async fn expire(&self, id: Uuid) -> Result<Arc<Hold>, InventoryError> {
        self.finalize(id, Finalize::Expire).await
    }

    pub async fn adjust(
        &self,
        sku: &str,
        location: &str,
        delta: i64,
        reason: &str,
        idempotency_key: Option<&str>,
    ) -> Result<StockLevels, InventoryError> {
        let key = stock_key(sku, location)?;
        if delta == 0 {
            return Err(InventoryError::Validation(
                "Adjustment delta must not be zero".to_string(),
            ));
        }
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(InventoryError::Validation(
                "Adjustment reason must not be empty".to_string(),
            ));
        }
        let token = idempotency_key
            .map(|k| ident(k, "Idempotency key"))
            .transpose()?;

        if let Some(token) = &token {
            match self.idempotency.claim(token.clone()) {
                Claim::Replayed(StoredOutcome::Adjusted { levels }) => return Ok(levels),
                Claim::Replayed(_) => {
                    return Err(InventoryError::Validation(
                        "Idempotency key was already used by a different operation".to_string(),
                    ));
                }
                Claim::InFlight => return Err(InventoryError::Timeout),
                Claim::Fresh => {}
            }
        }

        let this = self.clone();
        let task_token = token.clone();
        self.bounded(async move {
            let _guard = this.lock_key(&key).await;
            match this.ledger.adjust(&key, delta, &reason).await {
                Ok(levels) => {
                    if let Some(token) = &task_token {
                        this.idempotency
                            .complete(token, StoredOutcome::Adjusted { levels });
                    }
                    Ok(levels)
                }
                Err(e) => {
                    if let Some(token) = &task_token {
                        this.idempotency.abandon(token);
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    /// One sweep round: expire elapsed holds through the public path, then
    /// evict terminal holds and idempotency records past retention.
    pub async fn sweep(&self, now: Instant) {
        for id in self.holds.due(now) {
            match self.expire(id).await {
                Ok(_) => info!(reservation = %id, "reservation expired"),
                Err(
                    e @ (InventoryError::Unavailable(_)
                    | InventoryError::Timeout
                    | InventoryError::Internal(_)),
                ) => {
                    warn!(reservation = %id, error = %e, "expiry failed, rescheduling");
                    self.holds.reschedule(id);
                }
                Err(e) => trace!(reservation = %id, error = %e, "expiry lost the race"),
            }
        }
        self.holds.purge(now);
        self.idempotency.purge(now);
    }

    async fn finalize(&self, id: Uuid, how: Finalize) -> Result<Arc<Hold>, InventoryError> {
        let this = self.clone();
        self.bounded(async move {
            let hold = this
                .holds
                .get(id)
                .ok_or_else(|| InventoryError::no_reservation(id))?;
            let _guard = this.lock_key(&hold.key).await;
            this.holds.finalize(id, how).await
        })
        .await
    }

    /// Run a mutating operation on its own task so a timeout abandons the
    /// wait without cancelling work in flight.
    async fn bounded<T, F>(&self, op: F) -> Result<T, InventoryError>
    where
        F: Future<Output = Result<T, InventoryError>> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(op);
        match timeout(self.op_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(InventoryError::Internal(join_err.to_string())),
            Err(_) => Err(InventoryError::Timeout),
        }
    }

    /// Fair per-key mutex; same-key mutations run in submission order.
    async fn lock_key(&self, key: &StockKey) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        lock.lock_owned().await
    }

    fn ttl(&self, ttl_seconds: u64) -> Result<Duration, InventoryError> {
        if ttl_seconds == 0 {
            return Err(InventoryError::Validation(
                "TTL must be positive".to_string(),
            ));
        }
        if ttl_seconds > self.max_ttl.as_secs() {
            return Err(InventoryError::Validation(format!(
                "TTL exceeds the maximum of {} seconds",
                self.max_ttl.as_secs()
            )));
        }
        Ok(Duration::from_secs(ttl_seconds))
    }
}

fn ident(value: &str, what: &str) -> Result<Arc<str>, InventoryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InventoryError::Validation(format!(
            "{what} must not be empty"
        )));
    }
    if trimmed.len() > MAX_IDENT_LEN {
        return Err(InventoryError::Validation(format!(
            "{what} exceeds {MAX_IDENT_LEN} characters"
        )));
    }
    Ok(Arc::from(trimmed))
}

fn stock_key(sku: &str, location: &str) -> Result<StockKey, InventoryError> {
    Ok(StockKey {
        sku: ident(sku, "SKU")?,
        location: ident(location, "Location")?,
    })
}
