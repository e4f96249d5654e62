use crate::stock::{HoldState, StockKey};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("insufficient stock for {key}: requested {requested}, available {available}")]
    InsufficientStock {
        key: String,
        requested: u64,
        available: u64,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("operation not valid for reservation {id} in state {state}")]
    InvalidState { id: Uuid, state: HoldState },
    #[error("reservation {id} already finalized as {state}")]
    AlreadyFinalized { id: Uuid, state: HoldState },
    #[error("{0}")]
    Validation(String),
    #[error("operation timed out; retry with the same idempotency key")]
    Timeout,
    #[error("durable log unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl InventoryError {
    pub fn insufficient(key: &StockKey, requested: u64, available: u64) -> Self {
        Self::InsufficientStock {
            key: key.to_string(),
            requested,
            available,
        }
    }

    pub fn no_stock(key: &StockKey) -> Self {
        Self::NotFound(format!("no stock record for {key}"))
    }

    pub fn no_reservation(id: Uuid) -> Self {
        Self::NotFound(format!("reservation {id} not found"))
    }

    /// Machine-readable kind, for the transport layer to map onto its own
    /// status codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::NotFound(_) => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::AlreadyFinalized { .. } => "already_finalized",
            Self::Validation(_) => "validation",
            Self::Timeout => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::AlreadyFinalized { .. } => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
