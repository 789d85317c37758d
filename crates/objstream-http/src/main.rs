//! `objstream-server`: the structured streaming endpoints over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use objstream_http::{AppState, OpenAiProvider, ServerConfig, router};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve streamed structured model output over HTTP
#[derive(Parser, Debug)]
#[command(name = "objstream-server", version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./objstream.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overriding the configuration
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config =
        ServerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let provider = OpenAiProvider::from_config(&config.provider)
        .context("failed to configure the model provider")?;
    let state = AppState::new(Arc::new(provider), &config);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    info!(
        address = %listener.local_addr()?,
        model = %config.provider.model,
        timeout_ms = config.request_timeout_ms,
        "listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
