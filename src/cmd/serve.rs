//! `changes-dash serve`: the HTTP dashboard.

use std::sync::Arc;

use anyhow::{Context, Result};

use changes_dash::api::HttpChangesApi;
use changes_dash::config::DashConfig;
use changes_dash::pages::PageSettings;
use changes_dash::server::{AppState, ServerConfig, start_server};

pub async fn cmd_serve(config: &DashConfig, port: Option<u16>, open: bool, dev: bool) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let api = HttpChangesApi::new(&config.api.base_url, config.timeout())
        .context("Failed to create Changes API client")?;
    tracing::info!(base_url = %api.base_url(), "using Changes API");

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: port.unwrap_or(config.server.port),
        dev_mode: dev,
    };

    let state = AppState {
        api: Arc::new(api),
        settings: PageSettings {
            phabricator_host: config.links.phabricator_host.clone(),
            default_per_page: config.pusher.per_page,
        },
        aggregator: config.aggregator_config(),
    };

    // No browser inside dev containers.
    if open && !dev {
        let url = format!("http://localhost:{}/", server_config.port);
        tokio::spawn(async move {
            // Let the server bind first.
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                tracing::warn!(%url, error = %e, "failed to open browser");
            }
        });
    }

    start_server(server_config, state).await
}
