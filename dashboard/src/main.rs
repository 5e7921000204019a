use axum::{http::StatusCode, routing::get, Router};
use dashboard::chat::ChatClient;
use dashboard::config::Config;
use dashboard::fetcher::RtdbSource;
use dashboard::market::MarketClient;
use dashboard::rest::{self, AppState};
use dashboard::store::ReadingStore;
use dashboard::weather::WeatherClient;
use dashboard::{metrics, scheduler};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting sensor dashboard");
    info!("Realtime database: {}", config.rtdb_url);
    info!("Poll interval: {:?}", config.poll_interval);
    info!("HTTP server: {}", config.http_addr);

    if let Err(e) = metrics::init_metrics() {
        error!("Failed to register metrics: {}", e);
        std::process::exit(1);
    }

    let client = match reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(ReadingStore::new());
    let source = Arc::new(RtdbSource::new(
        client.clone(),
        config.rtdb_url.clone(),
        config.rtdb_auth.clone(),
    ));
    let poller = scheduler::spawn(source, Arc::clone(&store), config.poll_interval);

    let mut state = AppState::new(
        Arc::clone(&store),
        ChatClient::new(client.clone(), config.chat_url.clone(), config.chat_n_results)
            .with_timeout(config.chat_timeout),
    );
    state.refresh = Some(poller.trigger());
    state.weather_location = config.weather_location.clone();
    state.weather = match &config.weather_api_key {
        Some(key) => Some(WeatherClient::new(client.clone(), config.weather_base_url.clone(), key.clone())),
        None => {
            warn!("WEATHER_API_KEY not set, weather endpoint disabled");
            None
        }
    };
    state.market = match &config.market_api_key {
        Some(key) => Some(MarketClient::new(client.clone(), config.market_base_url.clone(), key.clone())),
        None => {
            warn!("MARKET_API_KEY not set, market endpoint disabled");
            None
        }
    };

    // Build HTTP app with REST API and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(state));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    poller.shutdown().await;
    info!("Shutting down");
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
