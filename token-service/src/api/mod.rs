//! # REST API for the Chat Token Service
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /auth/chat/app/token` - Issue an app token
//! - `GET /auth/chat/user/:username/token` - Issue a user token
//! - `GET /metrics` - App token cache statistics
//! - `POST /admin/cache/clear` - Drop the cached app token

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use shared::{
    error::TokenError,
    types::{HealthResponse, TokenResponse},
};

use crate::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/auth/chat/app/token", get(app_token))
        .route("/auth/chat/user/:username/token", get(user_token))
        .route("/metrics", get(get_metrics))
        .route("/admin/cache/clear", post(clear_cache));

    let router = if state.config.api.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: shared::VERSION.into(),
    })
}

/// Issue an app token
///
/// # Response
/// ```json
/// { "token": "007eJx...", "expires_at": "2025-01-01T00:00:00Z" }
/// ```
async fn app_token(State(state): State<Arc<AppState>>) -> Result<Json<TokenResponse>, ApiError> {
    info!("App token request received");

    let token = state.issuer.issue_app_token()?;
    Ok(Json(token_response(&state, token)))
}

/// Issue a user token, registering the user if the directory does not know it
async fn user_token(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<TokenResponse>, ApiError> {
    info!(username = %username, "User token request received");

    let token = state.issuer.issue_user_token(&username).await?;
    Ok(Json(token_response(&state, token)))
}

/// Get service metrics
async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.issuer.app_token_cache().stats().await;

    Json(serde_json::json!({
        "app_token_cache": {
            "cached": stats.cached,
            "hits": stats.hits,
            "computations": stats.computations,
        },
        "token_ttl_secs": state.issuer.token_ttl_secs(),
    }))
}

/// Drop the cached app token (admin endpoint)
async fn clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.issuer.app_token_cache().invalidate().await;
    Json(serde_json::json!({
        "status": "ok",
        "message": "App token cache cleared"
    }))
}

// =============================================================================
// HELPERS
// =============================================================================

fn token_response(state: &AppState, token: String) -> TokenResponse {
    TokenResponse {
        token,
        expires_at: Utc::now() + Duration::seconds(i64::from(state.issuer.token_ttl_secs())),
    }
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
    BadGateway(String),
    Internal(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::ValidationError(_) => ApiError::BadRequest(err.to_string()),

            TokenError::ConfigurationError(_) | TokenError::InvalidEnvVar { .. } => {
                ApiError::Unavailable(err.to_string())
            }

            TokenError::UpstreamLookupFailure(_)
            | TokenError::UpstreamCreateFailure(_)
            | TokenError::UserAlreadyExists(_) => ApiError::BadGateway(err.to_string()),

            TokenError::SigningFailure(_) | TokenError::SerializationError(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => {
                warn!(error = %msg, "Service not configured");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ApiError::BadGateway(msg) => {
                warn!(error = %msg, "User directory error");
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
