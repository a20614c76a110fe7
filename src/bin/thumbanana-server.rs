// ABOUTME: Server binary for the Thumbanana thumbnail generation API
// ABOUTME: Loads configuration, initializes logging and resources, and serves HTTP until shutdown
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Thumbanana Server Binary
//!
//! Starts the HTTP API on the configured host and port.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use thumbanana_server::{config::ServerConfig, logging, resources::ServerResources, routes};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "thumbanana-server")]
#[command(about = "Thumbanana - YouTube thumbnail generation API")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.http_port = port;
    }

    info!("Starting Thumbanana server");
    info!("{}", config.summary());

    let addr: SocketAddr = format!("{}:{}", config.host, config.http_port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.http_port))?;

    let resources = Arc::new(ServerResources::new(config).await?);
    if !resources.generator.is_configured() {
        error!("GEMINI_API_KEY is not set; generation requests will be refused");
    }

    let app = routes::router(resources);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on http://{addr}");
    display_available_endpoints(addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutdown signal received, draining in-flight requests");
}

#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(addr: SocketAddr) {
    info!("=== Available API Endpoints ===");
    info!("   Generate:   POST http://{addr}/api/generate");
    info!("   Status:     GET  http://{addr}/api/generate/{{id}}/status");
    info!("   Download:   GET  http://{addr}/api/images/{{generation_id}}/{{variant}}/download");
    info!("   History:    GET  http://{addr}/api/history");
    info!("   Stats:      GET  http://{addr}/api/history/stats");
    info!("   Regenerate: POST http://{addr}/api/history/{{id}}/regenerate");
    info!("   Usage:      GET  http://{addr}/api/usage");
    info!("   Health:     GET  http://{addr}/health");
    info!("   Readiness:  GET  http://{addr}/ready");
    info!("=== End of Endpoint List ===");
}
