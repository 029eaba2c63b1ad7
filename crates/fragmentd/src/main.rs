use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fragmentd::{router, telemetry, AppState, ServerConfig, Users};
use fragments::Fragments;

/// Fragments HTTP server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of ./fragments.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and FRAGMENTS_HTTP_PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = ServerConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.bind.http_port = port;
    }

    telemetry::init(&config.telemetry.log_level).context("Failed to initialize logging")?;

    for file in &sources.files {
        tracing::info!("Loaded config: {}", file.display());
    }
    for var in &sources.env_overrides {
        tracing::info!("Env override: {}", var);
    }

    let store = fragments::open_store(&config.store).context("Failed to open fragment store")?;
    let users = Users::from_config(&config.auth.users);
    if users.is_empty() {
        tracing::warn!("No users configured under [auth.users]; every /v1 request will be rejected");
    } else {
        tracing::info!("Loaded {} user(s)", users.len());
    }

    let state = AppState::new(Fragments::new(store), users);
    let app = router(state, config.limits.max_body_bytes);

    let addr: SocketAddr = format!("{}:{}", config.bind.host, config.bind.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind.host))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
