use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use log::{info, warn};

use crate::auth::SessionManager;
use crate::data::{Broadcaster, STOCKS_TOPIC};
use crate::portfolio::PortfolioStore;

#[derive(Clone)]
pub struct ApiState {
    pub portfolio: Arc<PortfolioStore>,
    pub session_manager: SessionManager,
    pub broadcaster: Arc<Broadcaster>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PortfolioResponse {
    pub success: bool,
    pub message: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub cookies: usize,
    pub handshakes: u64,
}

// GET /api/stocks/ping
pub async fn ping() -> &'static str {
    "pong"
}

// GET /api/stocks/portfolio - List watched symbols
pub async fn get_portfolio(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.portfolio.list())
}

// POST /api/stocks/portfolio/:symbol - Add a symbol
pub async fn add_to_portfolio(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> Result<Json<PortfolioResponse>, (StatusCode, Json<PortfolioResponse>)> {
    match state.portfolio.add(&symbol) {
        Ok(added) => {
            let message = if added {
                info!("Added {} to portfolio", symbol);
                format!("{} added to portfolio", symbol)
            } else {
                format!("{} already in portfolio", symbol)
            };
            Ok(Json(PortfolioResponse {
                success: true,
                message,
                symbols: state.portfolio.list(),
            }))
        }
        Err(e) => {
            warn!("Failed to add {} to portfolio: {}", symbol, e);
            Err((StatusCode::BAD_REQUEST, Json(PortfolioResponse {
                success: false,
                message: e.to_string(),
                symbols: state.portfolio.list(),
            })))
        }
    }
}

// DELETE /api/stocks/portfolio/:symbol - Remove a symbol
pub async fn remove_from_portfolio(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> Result<Json<PortfolioResponse>, (StatusCode, Json<PortfolioResponse>)> {
    match state.portfolio.remove(&symbol) {
        Ok(removed) => {
            let message = if removed {
                info!("Removed {} from portfolio", symbol);
                format!("{} removed from portfolio", symbol)
            } else {
                format!("{} was not in portfolio", symbol)
            };
            Ok(Json(PortfolioResponse {
                success: true,
                message,
                symbols: state.portfolio.list(),
            }))
        }
        Err(e) => {
            warn!("Failed to remove {} from portfolio: {}", symbol, e);
            Err((StatusCode::BAD_REQUEST, Json(PortfolioResponse {
                success: false,
                message: e.to_string(),
                symbols: state.portfolio.list(),
            })))
        }
    }
}

// POST /api/stocks/session/refresh - Force a new NSE handshake
pub async fn refresh_session(State(state): State<ApiState>) -> Json<SessionResponse> {
    info!("Manual NSE session refresh requested");
    state.session_manager.refresh().await;
    Json(session_response(&state.session_manager))
}

// GET /api/stocks/session - Current NSE session status
pub async fn get_session(State(state): State<ApiState>) -> Json<SessionResponse> {
    Json(session_response(&state.session_manager))
}

fn session_response(session_manager: &SessionManager) -> SessionResponse {
    SessionResponse {
        authenticated: session_manager.is_authenticated(),
        cookies: session_manager.get().len(),
        handshakes: session_manager.handshake_count(),
    }
}

// GET /api/health - Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "nse_tracker",
        "nse_session": state.session_manager.is_authenticated(),
        "subscribers": state.broadcaster.get_subscriber_count(STOCKS_TOPIC),
        "timestamp": chrono::Utc::now()
    }))
}

// Create the API router
pub fn create_api_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stocks/ping", get(ping))
        .route("/stocks/portfolio", get(get_portfolio))
        .route("/stocks/portfolio/:symbol", post(add_to_portfolio).delete(remove_from_portfolio))
        .route("/stocks/session", get(get_session))
        .route("/stocks/session/refresh", post(refresh_session))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
}
