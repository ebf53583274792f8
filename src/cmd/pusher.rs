//! `changes-dash pusher`: the multi-project commit grid, in the terminal.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;

use changes_dash::api::HttpChangesApi;
use changes_dash::conditions::Condition;
use changes_dash::config::DashConfig;
use changes_dash::pages::{PageSettings, pusher_query};
use changes_dash::pusher::merge::{DurationDisplay, LatestBuildSummary};
use changes_dash::pusher::{Aggregator, PusherView, Snapshot};

/// Project selection as given on the command line.
pub struct PusherSelection {
    pub projects: Vec<String>,
    pub branch: Option<String>,
    pub main: Vec<String>,
    pub per_page: Option<u32>,
}

impl PusherSelection {
    /// The same parameters the pusher page reads from its location.
    fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for project in &self.projects {
            params.push(("project".to_string(), project.clone()));
        }
        if let Some(branch) = &self.branch {
            params.push(("branch".to_string(), branch.clone()));
        }
        for main in &self.main {
            params.push(("main".to_string(), main.clone()));
        }
        if let Some(per_page) = self.per_page {
            params.push(("per_page".to_string(), per_page.to_string()));
        }
        params
    }
}

pub async fn cmd_pusher(config: &DashConfig, selection: PusherSelection, rounds: Option<u64>) -> Result<()> {
    let settings = PageSettings {
        phabricator_host: config.links.phabricator_host.clone(),
        default_per_page: config.pusher.per_page,
    };
    let query = pusher_query(&selection.to_params(), &settings);
    if query.is_empty() {
        anyhow::bail!("No projects selected. Pass --project <slug> or --main <slug>::<branch>.");
    }

    let api = HttpChangesApi::new(&config.api.base_url, config.timeout())
        .context("Failed to create Changes API client")?;
    let aggregator = Aggregator::new(Arc::new(api), query, config.aggregator_config());
    let mut snapshots = aggregator.subscribe();
    aggregator.start();

    println!(
        "Watching {} every {}s (Ctrl+C to stop)",
        style(aggregator.query().slugs.join(", ")).cyan(),
        config.aggregator_config().poll_interval.as_secs()
    );

    let mut applied = 0u64;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest: Option<Arc<Snapshot>> = snapshots.borrow_and_update().clone();
                let Some(snapshot) = latest else { continue };
                print_view(&aggregator.render_snapshot(&snapshot), snapshot.generation);
                print_feed_errors(&snapshot);

                applied += 1;
                if rounds.is_some_and(|limit| applied >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    aggregator.stop();
    Ok(())
}

fn styled_cell(cell: Option<&LatestBuildSummary>) -> String {
    let Some(cell) = cell else {
        return style("-").dim().to_string();
    };
    let text = match &cell.duration {
        DurationDisplay::Static { text } if !text.is_empty() => {
            format!("{} {}", cell.condition.short_text(), text)
        }
        _ => cell.condition.short_text().to_string(),
    };
    match cell.condition {
        Condition::Passed => style(text).green().to_string(),
        Condition::Failed | Condition::FailedInfra => style(text).red().to_string(),
        Condition::Waiting => style(text).blue().to_string(),
        Condition::FailedAborted | Condition::Unknown => style(text).dim().to_string(),
    }
}

fn print_view(view: &PusherView, generation: u64) {
    println!();
    let names: Vec<String> = view
        .headers
        .iter()
        .map(|h| style(&h.name).bold().to_string())
        .collect();
    println!(
        "{} {}",
        style(format!("round {}", generation)).dim(),
        names.join(" | ")
    );

    if view.rows.is_empty() {
        println!("  {}", style("(no commits)").dim());
        return;
    }

    for row in &view.rows {
        let cells: Vec<String> = row.cells.iter().map(|c| styled_cell(c.as_ref())).collect();
        let author = row
            .author
            .as_ref()
            .map(|a| a.label.as_str())
            .unwrap_or("");
        println!(
            "  {} {} {} [{}]",
            style(&row.commit_label).yellow(),
            row.title,
            style(author).dim(),
            cells.join(" | ")
        );
    }
}

fn print_feed_errors(snapshot: &Snapshot) {
    for feed in &snapshot.feeds {
        if let Some(error) = &feed.error {
            eprintln!("  {} {}: {}", style("!").red(), feed.slug, error);
        }
    }
}
