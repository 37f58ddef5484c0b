//! Parley Server: real-time chat presence and messaging fanout.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use parley_api::{AppState, build_router};
use parley_auth::{JwtAuthenticator, JwtEncoder};
use parley_core::config::AppConfig;
use parley_core::error::AppError;
use parley_entity::{FriendshipStatus, User};
use parley_realtime::RealtimeEngine;
use parley_store::MemoryStore;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "parley-server", version, about = "Parley chat fanout server")]
struct Args {
    /// Directory holding `default.toml` and per-environment overlays.
    #[arg(long = "config", env = "PARLEY_CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Environment overlay to apply on top of `default.toml`.
    #[arg(long, env = "PARLEY_ENV", default_value = "development")]
    env: String,

    /// Seed the in-memory store with these usernames, all friends with
    /// each other, and log an access token for each.
    #[arg(long, value_delimiter = ',')]
    seed: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(&args.config_dir, &args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(dir = %args.config_dir, env = %args.env, "Configuration loaded");

    if let Err(e) = run(config, &args.seed).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig, seed: &[String]) -> Result<(), AppError> {
    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(MemoryStore::new());
    if !seed.is_empty() {
        seed_users(&store, &config, seed)?;
    }

    let authenticator = Arc::new(JwtAuthenticator::new(&config.auth, store.clone()));
    let engine = RealtimeEngine::new(config.realtime.clone(), store, authenticator.clone());

    let addr = config.server.bind_address();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let state = AppState::new(config, engine, authenticator);
    let engine = state.engine.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Parley server listening on {}", addr);

    let shutdown = engine.shutdown_token();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => return finish(result),
        _ = shutdown_signal() => {}
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    engine.shutdown().await;

    match tokio::time::timeout(grace, server).await {
        Ok(result) => finish(result)?,
        Err(_) => {
            tracing::warn!(grace_seconds = grace.as_secs(), "Graceful shutdown timed out");
        }
    }

    tracing::info!("Parley server shut down gracefully");
    Ok(())
}

fn finish(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(AppError::internal(format!("Server error: {e}"))),
        Err(e) => Err(AppError::internal(format!("Server task failed: {e}"))),
    }
}

/// Create seed users with mutual accepted friendships.
fn seed_users(store: &MemoryStore, config: &AppConfig, names: &[String]) -> Result<(), AppError> {
    let encoder = JwtEncoder::new(&config.auth);
    let users: Vec<User> = names
        .iter()
        .map(|name| store.insert_user(User::new(name.trim())))
        .collect();

    for (i, a) in users.iter().enumerate() {
        for b in &users[i + 1..] {
            store.add_friendship(a.id, b.id, FriendshipStatus::Accepted);
        }
    }

    for user in &users {
        let (token, expires_at) = encoder.issue(&user.identity())?;
        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            expires_at = %expires_at,
            token = %token,
            "Seeded user"
        );
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
