use anyhow::Result;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod services;
mod types;

use crate::api::routes::create_router;
use crate::api::state::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    if config.dune_api_key.is_none() {
        tracing::warn!("DUNE_API_KEY_TOKEN is not set; metrics requests will return 503");
    }

    let addr = config.bind_addr;
    let state = AppState::new(config)?;
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("Failed to serve API: {:?}", e);
        return Err(e.into());
    }

    Ok(())
}
