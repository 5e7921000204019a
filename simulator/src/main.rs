mod readings;

use axum::{extract::State, routing::get, Json, Router};
use clap::Parser;
use readings::{generate_reading, Database};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Mock realtime database serving generated sensor readings.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, env = "SIM_ADDR", default_value = "0.0.0.0:9000")]
    addr: String,

    /// Seconds between generated readings
    #[arg(long, env = "SIM_TICK_SECS", default_value_t = 5)]
    tick_secs: u64,

    /// History entries kept before the oldest are dropped
    #[arg(long, env = "SIM_HISTORY", default_value_t = 50)]
    history: usize,

    /// Probability of a water level sensor fault per reading
    #[arg(long, env = "SIM_FAULT_RATE", default_value_t = 0.05)]
    fault_rate: f64,
}

type Db = Arc<RwLock<Database>>;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.fault_rate) || args.tick_secs == 0 {
        error!("fault rate must be within 0..=1 and tick must be positive");
        std::process::exit(1);
    }

    info!("Starting sensor simulator");
    info!(
        "Tick: {}s, history: {}, fault rate: {}",
        args.tick_secs, args.history, args.fault_rate
    );

    let db: Db = Arc::new(RwLock::new(Database::new(args.history)));
    tokio::spawn(run_generator(Arc::clone(&db), args.tick_secs, args.fault_rate));

    let app = Router::new()
        .route("/Current.json", get(current))
        .route("/History.json", get(history))
        .with_state(db);

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", args.addr, e);
            std::process::exit(1);
        });
    info!("Serving readings on {}", args.addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("HTTP server error: {}", e);
    }
}

async fn run_generator(db: Db, tick_secs: u64, fault_rate: f64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(tick_secs));
    let mut generated = 0u64;

    loop {
        ticker.tick().await;
        let reading = {
            let mut rng = rand::thread_rng();
            generate_reading(&mut rng, fault_rate)
        };
        db.write().await.advance(reading);

        generated += 1;
        if generated % 100 == 0 {
            info!("Generated {} readings", generated);
        }
    }
}

// Absent nodes read as JSON null, as the real database returns them.
async fn current(State(db): State<Db>) -> Json<Value> {
    let db = db.read().await;
    Json(serde_json::to_value(&db.current).unwrap_or(Value::Null))
}

async fn history(State(db): State<Db>) -> Json<Value> {
    let db = db.read().await;
    if db.history.is_empty() {
        return Json(Value::Null);
    }
    Json(serde_json::to_value(&db.history).unwrap_or(Value::Null))
}
