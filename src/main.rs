use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;

use wallafeed::config::Config;
use wallafeed::feed::HttpFetcher;
use wallafeed::storage::Database;
use wallafeed::wallabag::WallabagClient;
use wallafeed::web::{create_router, AppState};
use wallafeed::worker::PollingWorker;

#[derive(Parser, Debug)]
#[command(name = "wallafeed", about = "Forwards RSS/Atom articles to wallabag")]
struct Args {
    /// Override the database path from the environment
    #[arg(long, value_name = "FILE")]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load .env if present; real environment variables take precedence
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env().context("Configuration error")?;
    tracing::info!(?config, "Loaded configuration");

    let db_path = args.database.unwrap_or_else(|| config.database_path.clone());
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("wallafeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let fetcher = HttpFetcher::new(http.clone());
    let delivery = WallabagClient::new(http, &config.wallabag_url, config.wallabag_credentials())
        .context("Failed to create wallabag client")?;

    let worker = Arc::new(PollingWorker::new(db.clone(), fetcher, delivery));
    let handle = worker
        .start()
        .await
        .context("Failed to start polling worker")?;

    let state = AppState {
        db,
        worker: worker.clone(),
    };
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    handle.stop().await;
    println!("Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
