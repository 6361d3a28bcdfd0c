//! PageLens API Server
//!
//! REST API server for the PageLens document store.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use pagelens_api::{create_router, AppState};
use pagelens_core::config::{AppConfig, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tower_http=debug", logging.level))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var("PAGELENS_CONFIG") {
        Ok(path) => Ok(AppConfig::from_file(&path)
            .with_context(|| format!("loading {path}"))?
            .with_env_override()?),
        Err(_) => Ok(AppConfig::from_env()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::from_config(config).await?);

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("PageLens API Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
