// define modules in crate
mod auth;
mod config;
mod domain;
mod dtos;
mod errors;
mod query;
mod repositories;
mod routes;
mod state;

use std::{
    fs::File,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use config::Config;
use dotenv::dotenv;
use mongodb::Client;
use repositories::{ListingRepository, MongoDbListingRepository};
use state::AppState;
use tokio::{net::TcpListener, signal};
use tracing::{event, Level};

use crate::auth::TokenService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config)?;

    let client = Client::with_uri_str(&config.mongodb.uri)
        .await
        .context("failed to create MongoDB client")?;

    let listing_repository = Arc::new(MongoDbListingRepository::new(&config.mongodb, &client));
    listing_repository
        .ping()
        .await
        .context("failed to reach MongoDB")?;
    event!(Level::INFO, "Pinged your deployment. Connected to MongoDB!");

    let state = Arc::new(AppState::new(
        listing_repository,
        TokenService::new(config.token_secret.as_bytes()),
    ));

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();

    let app = routes::router(state)
        .route("/metrics", get(|| async move { metrics_handle.render() }))
        .layer(prometheus_layer);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    event!(Level::INFO, "Server is running on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.shutdown().await;
    event!(Level::INFO, "MongoDB client closed");

    Ok(())
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(false)
        .with_ansi(false)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true);

    match &config.log_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            subscriber.with_writer(Mutex::new(file)).init();
        }
        None => subscriber.init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            event!(Level::WARN, "failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                event!(Level::WARN, "failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    event!(Level::INFO, "shutdown signal received");
}
