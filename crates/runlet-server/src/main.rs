//! Runlet - remote JavaScript execution service
//!
//! Clients POST a module exporting a single function, plus input items and
//! a cache key; the service materialises npm dependencies (reusing keyed
//! cache entries), runs the module in a Node child process under a
//! deadline, and returns the result with captured console output.

use anyhow::{Context, Result};
use runlet_core::ServiceConfig;
use runlet_deps::CacheManager;
use runlet_sandbox::NodeRunner;
use runlet_server::{create_router, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Runlet v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::from_env();
    let port = config.port;

    tokio::fs::create_dir_all(&config.execution_dir)
        .await
        .with_context(|| format!("creating {}", config.execution_dir.display()))?;
    tokio::fs::create_dir_all(&config.cache_dir)
        .await
        .with_context(|| format!("creating {}", config.cache_dir.display()))?;

    if config.auth_enabled() {
        info!("Authentication enabled");
    } else {
        warn!("SECRET_KEY not set, authentication disabled");
    }

    let node_version = NodeRunner::new()
        .interpreter_version()
        .await
        .context("probing the Node.js interpreter")?;
    info!(node_version, "Guest interpreter ready");

    // reclaim any budget overrun left behind by a previous run
    let cache = CacheManager::new(config.cache_dir.clone(), config.cache_size_limit);
    let freed = tokio::task::spawn_blocking(move || cache.sweep()).await?;
    if freed > 0 {
        info!(freed_bytes = freed, "Startup cache sweep reclaimed space");
    }

    let state = AppState::new(config, node_version);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
