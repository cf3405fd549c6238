//! # Chat Token Service
//!
//! Issues app and user tokens for the chat backend.
//!
//! ## Running
//!
//! ```bash
//! # Set required environment variables
//! export CHAT_APP_ID=970ca35de60c44645bbae8a215061b33
//! export CHAT_APP_CERTIFICATE=5cfd2fd1755d40ecb72977518be15d3b
//! export CHAT_TOKEN_EXPIRE_SECS=3600
//!
//! # Required for user tokens
//! export CHAT_APP_KEY=org1#app1
//! export CHAT_DOMAIN=a1.chat.example.com
//!
//! # Run the service
//! cargo run --release
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /auth/chat/app/token` - Issue an app token
//! - `GET /auth/chat/user/:username/token` - Issue a user token
//! - `GET /metrics` - Get service metrics

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use shared::config::ChatTokenConfig;
use token_service::{api, issuance::TokenIssuanceService, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Chat Token Service");
    info!("Version: {}", shared::VERSION);

    // Load configuration
    let config = ChatTokenConfig::from_env()?;
    config.validate()?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    info!(
        app_id = %config.credentials.app_id,
        app_key = %config.directory.app_key,
        directory_host = %config.directory.host,
        token_ttl = config.token_ttl_secs,
        lookup_failure_policy = ?config.directory.lookup_failure_policy,
        "Configuration loaded"
    );

    let issuer = TokenIssuanceService::from_config(&config)?;

    let state = Arc::new(AppState {
        config: config.clone(),
        issuer,
    });

    let app = api::create_router(state);

    // Start server
    let bind_addr = config.api.bind_addr();
    info!(address = %bind_addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
