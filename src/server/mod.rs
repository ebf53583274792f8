//! HTTP surface: route dispatch, page view models and the live pusher socket.

pub mod handlers;
pub mod ws;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::api::ChangesApi;
use crate::pages::PageSettings;
use crate::pusher::AggregatorConfig;

/// Configuration for the dashboard server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3142,
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    /// Dev mode listens on every interface.
    pub fn bind_addr(&self) -> String {
        let host = if self.dev_mode { "0.0.0.0" } else { self.host.as_str() };
        format!("{}:{}", host, self.port)
    }
}

pub struct AppState {
    pub api: Arc<dyn ChangesApi>,
    pub settings: PageSettings,
    /// Template for the aggregator each pusher socket owns.
    pub aggregator: AggregatorConfig,
}

pub type SharedState = Arc<AppState>;

/// Full router: JSON endpoints, the pusher socket, and path dispatch for
/// everything else.
pub fn build_router(state: SharedState) -> Router {
    handlers::api_router()
        .route("/ws/pusher", get(ws::pusher_ws_handler))
        .fallback(handlers::page_handler)
        .with_state(state)
}

pub async fn start_server(config: ServerConfig, state: AppState) -> Result<()> {
    let mut app = build_router(Arc::new(state));

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, dev_mode = config.dev_mode, "dashboard listening");
    println!("Changes dashboard running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        // Without a handler the server runs until killed.
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
