mod websocket;
mod api;
mod auth;
mod data;
mod config;
mod error;
mod portfolio;

use std::time::Duration;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::interval;
use log::{info, error};
use tower_http::cors::CorsLayer;

use crate::config::{Config, BROADCAST_CHANNEL_SIZE, STATS_INTERVAL_SECS};
use crate::auth::SessionManager;
use crate::data::{build_http_client, Broadcaster, Fetcher, Poller, PollSchedule, STOCKS_TOPIC};
use crate::portfolio::PortfolioStore;
use crate::websocket::WebSocketHandler;
use crate::api::{ApiState, create_api_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    config.log_config();

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e.into());
    }

    // NSE session and fetch pipeline
    let client = build_http_client(config.http_timeout())?;
    let session_manager = SessionManager::new(
        client.clone(),
        &config.nse_base_url,
        config.landing_url(),
        config.settle_delay(),
    );
    let fetcher = Fetcher::new(client, session_manager.clone(), &config.nse_base_url);
    let broadcaster = Arc::new(Broadcaster::new(BROADCAST_CHANNEL_SIZE));
    let portfolio = Arc::new(PortfolioStore::load(&config.portfolio_file));

    let poller = Poller::new(
        fetcher,
        broadcaster.clone(),
        config.index_name.clone(),
        PollSchedule::from_config(&config),
    ).spawn();

    start_background_tasks(broadcaster.clone(), session_manager.clone());

    // Start API server
    let api_state = ApiState {
        portfolio,
        session_manager,
        broadcaster: broadcaster.clone(),
    };

    let api_router = create_api_router(api_state)
        .layer(CorsLayer::permissive()); // Frontend is served from another origin

    let api_listener = TcpListener::bind(&config.api_bind_address).await?;
    info!("🌐 HTTP API server running at http://{}", config.api_bind_address);

    let api_server = axum::serve(api_listener, api_router);

    // Start WebSocket server
    let ws_listener = TcpListener::bind(&config.bind_address).await?;
    info!("🚀 WebSocket server running at ws://{}{}", config.bind_address, websocket::handler::WS_PATH);
    info!("📡 Snapshots published on topic {}", STOCKS_TOPIC);

    let websocket_server = async move {
        while let Ok((stream, addr)) = ws_listener.accept().await {
            let handler = WebSocketHandler::new(addr.to_string());
            tokio::spawn(handler.handle_connection(stream, broadcaster.clone()));
        }
    };

    tokio::select! {
        result = api_server => {
            error!("API server stopped: {:?}", result);
        }
        _ = websocket_server => {
            error!("WebSocket server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    poller.shutdown().await;
    Ok(())
}

fn start_background_tasks(broadcaster: Arc<Broadcaster>, session_manager: SessionManager) {
    tokio::spawn(async move {
        let mut interval_timer = interval(Duration::from_secs(STATS_INTERVAL_SECS));

        loop {
            interval_timer.tick().await;
            let (topic_count, session_count) = broadcaster.get_stats();
            info!("Stats - Topics: {}, Subscribed sessions: {}, NSE session: {:?}, Handshakes: {}",
                  topic_count, session_count, session_manager.state(), session_manager.handshake_count());
        }
    });

    info!("📈 Started stats monitoring task (every {} seconds)", STATS_INTERVAL_SECS);
}
