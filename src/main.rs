use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::utils::cli::Args;
use crate::utils::state::AppState;

mod api;
mod config;
mod domain;
mod error;
mod registry;
mod replication;
mod service;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = build_config(&args);

    let pool = PgPoolOptions::new()
        .max_connections(12)
        .connect(&config.db_url)
        .await?;
    let state = Arc::new(AppState::new(config, Arc::new(pool))?);

    let app = api::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        state.config.host, state.config.port
    ))
    .await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // let dispatched replication/audit/refresh work drain before exiting
    state.tasks.close();
    state.tasks.wait().await;
    Ok(())
}

fn build_config(args: &Args) -> Config {
    let registry_url = args.registry_url.trim_end_matches('/').to_string();
    let token_service_url = if args.token_service_url.is_empty() {
        format!("{registry_url}/service/token")
    } else {
        args.token_service_url.clone()
    };

    Config {
        host: args.host.clone(),
        port: args.port,
        registry_url,
        token_service_url,
        replication_url: args.replication_url.clone(),
        service_secret: args.service_secret.clone(),
        insecure: args.insecure,
        empty_repo_not_found: args.empty_repo_not_found,
        db_url: args.database_url.clone(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
