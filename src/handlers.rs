use crate::{
    app_state::AppState,
    error::InventoryError,
    ledger::ledger::Ledger,
    stock::{HoldState, ReservationView},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
pub struct ReserveRequest {
    pub sku: String,
    pub location: String,
    pub quantity: u64,
    pub ttl_seconds: u64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub reservation_id: Uuid,
}

#[derive(Serialize, Deserialize)]
pub struct AdjustRequest {
    pub sku: String,
    pub location: String,
    pub delta: i64,
    pub reason: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct StockResponse {
    pub sku: String,
    pub location: String,
    pub available: u64,
    pub reserved: u64,
}

#[derive(Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub reservation_id: Uuid,
    pub state: HoldState,
}

pub async fn handle_get_stock<L: Ledger>(
    State(state): State<AppState<L>>,
    Path((sku, location)): Path<(String, String)>,
) -> Result<Json<StockResponse>, InventoryError> {
    let levels = state.inventory.get_stock(&sku, &location).await?;
    Ok(Json(StockResponse {
        sku,
        location,
        available: levels.available,
        reserved: levels.reserved,
    }))
}

pub async fn handle_get_reservation<L: Ledger>(
    State(state): State<AppState<L>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationView>, InventoryError> {
    let hold = state.inventory.reservation(id)?;
    Ok(Json(ReservationView::from(hold.as_ref())))
}

pub async fn handle_reserve<L: Ledger>(
    State(state): State<AppState<L>>,
    Json(req): Json<ReserveRequest>,
) -> Result<Json<ReservationView>, InventoryError> {
    let hold = state
        .inventory
        .reserve(
            &req.sku,
            &req.location,
            req.quantity,
            req.ttl_seconds,
            req.idempotency_key.as_deref(),
        )
        .await?;
    Ok(Json(ReservationView::from(hold.as_ref())))
}

pub async fn handle_commit<L: Ledger>(
    State(state): State<AppState<L>>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, InventoryError> {
    let hold = state.inventory.commit(req.reservation_id).await?;
    Ok(Json(FinalizeResponse {
        reservation_id: hold.id,
        state: hold.state(),
    }))
}

pub async fn handle_release<L: Ledger>(
    State(state): State<AppState<L>>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, InventoryError> {
    let hold = state.inventory.release(req.reservation_id).await?;
    Ok(Json(FinalizeResponse {
        reservation_id: hold.id,
        state: hold.state(),
    }))
}

pub async fn handle_adjust<L: Ledger>(
    State(state): State<AppState<L>>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<StockResponse>, InventoryError> {
    let levels = state
        .inventory
        .adjust(
            &req.sku,
            &req.location,
            req.delta,
            &req.reason,
            req.idempotency_key.as_deref(),
        )
        .await?;
    Ok(Json(StockResponse {
        sku: req.sku,
        location: req.location,
        available: levels.available,
        reserved: levels.reserved,
    }))
}

pub fn router<L: Ledger>(state: AppState<L>) -> Router {
    Router::new()
        .route("/stock/{sku}/{location}", get(handle_get_stock::<L>))
        .route("/reservations/{id}", get(handle_get_reservation::<L>))
        .route("/reserve", post(handle_reserve::<L>))
        .route("/commit", post(handle_commit::<L>))
        .route("/release", post(handle_release::<L>))
        .route("/adjust", post(handle_adjust::<L>))
        .with_state(state)
}
