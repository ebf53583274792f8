//! `changes-dash resolve`: show where a dashboard path leads.

use anyhow::{Context, Result};
use serde::Serialize;

use changes_dash::api::HttpChangesApi;
use changes_dash::config::DashConfig;
use changes_dash::router::{self, Dispatch, NavigationContext, PageId, Resolution};

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize resolution")?;
    println!("{}", json);
    Ok(())
}

/// Print the resolution of `path`. With `follow`, `find_*` paths are looked
/// up against the API and the permalink is printed instead.
pub async fn cmd_resolve(config: &DashConfig, path: &str, follow: bool) -> Result<()> {
    let resolution = router::resolve(path);
    if !follow || matches!(resolution, Resolution::Page(_)) {
        return print_json(&resolution);
    }

    let api = HttpChangesApi::new(&config.api.base_url, config.timeout())
        .context("Failed to create Changes API client")?;
    let ctx = NavigationContext::detached(path);

    match router::dispatch(&ctx, &api).await {
        Dispatch::Redirected { target } => print_json(&serde_json::json!({
            "resolution": "redirected",
            "target": target,
        })),
        Dispatch::Page(route) => {
            let failed = route.page == PageId::RedirectFailed;
            let message = route.message.clone().unwrap_or_default();
            print_json(&Resolution::Page(route))?;
            if failed {
                anyhow::bail!(message);
            }
            Ok(())
        }
    }
}
