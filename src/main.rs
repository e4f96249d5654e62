use std::{error::Error, sync::Arc};
use stockledger::{
    app_state::AppState,
    config::Config,
    dispatcher::Inventory,
    error::InventoryError,
    handlers::router,
    ledger::{journal::InMemoryJournal, memory::InMemoryLedger},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Starting up");
    let config = Config::from_env();
    let ledger = Arc::new(InMemoryLedger::new(Arc::new(InMemoryJournal::default())));
    let app_state = AppState {
        inventory: Inventory::new(ledger, config.clone()),
    };

    let app = router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Listening on {}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .map_err(|e| InventoryError::Internal(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| InventoryError::Internal(e.to_string()))?;

    Ok(())
}
