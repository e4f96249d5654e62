use std::{error::Error, sync::Arc};
use stockledger::{
    app_state::AppState,
    config::Config,
    dispatcher::Inventory,
    error::InventoryError,
    handlers::router,
    ledger::{journal::InMemoryJournal, memory::InMemoryLedger},
};
use tokio::signal;
use tracing::info;

pub async fn run_full_server(port: u16) -> Result<(), Box<dyn Error>> {
    let ledger = Arc::new(InMemoryLedger::new(Arc::new(InMemoryJournal::default())));
    let app_state = AppState {
        inventory: Inventory::new(ledger, Config::default()),
    };

    let app = router(app_state);

    info!("Listening on {}", port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .map_err(|e| InventoryError::Internal(e.to_string()))?;

    let shutdown = signal::ctrl_c();

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown
                .await
                .expect("Failed to listen for shutdown signal");
            info!("Shutting down gracefully...");
        })
        .await
        .map_err(|e| InventoryError::Internal(e.to_string()))?;

    Ok(())
}
