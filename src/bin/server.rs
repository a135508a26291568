//! Binary entry point: loads configuration, installs logging, and serves the HTTP adapter.

use conduit::config::{Config, SharedConfig};
use conduit::http::{router, AppState};
use conduit::logging;

const PROFILE_PATH: &str = "conduit.yaml";

#[tokio::main]
async fn main() {
    let config = Config::load(PROFILE_PATH).unwrap_or_else(|err| {
        eprintln!("failed to load {PROFILE_PATH}: {err}, using defaults");
        Config::default()
    });

    logging::init(&config.log_filter);
    tracing::info!(workers = config.workers, bind_address = %config.bind_address, "starting conduit-server");

    let bind_address = config.bind_address.clone();
    let state = AppState {
        config: SharedConfig::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {bind_address}: {err}"));

    axum::serve(listener, router(state))
        .await
        .unwrap_or_else(|err| panic!("server exited: {err}"));
}
