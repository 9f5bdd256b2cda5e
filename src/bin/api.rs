//! Read API over the loaded card table.

use std::process::ExitCode;

use scryfall_bulk::config::Settings;
use scryfall_bulk::{api, logging, CardStore};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init_tracing("info,tower_http=debug") {
        eprintln!("{}", e);
    }

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::from(2);
        }
    };

    let store = CardStore::new(&settings.db_path);
    let app = api::router(store);

    let listener = match tokio::net::TcpListener::bind(settings.api_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %settings.api_addr, error = %e, "bind failed");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %settings.api_addr, db = %settings.db_path.display(), "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
