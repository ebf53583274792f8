use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use changes_dash::config::DashConfig;
use changes_dash::logging::init_logging;

mod cmd;

#[derive(Parser)]
#[command(name = "changes-dash")]
#[command(version, about = "Live build dashboard for the Changes CI service")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to dashboard.toml (defaults to .changes/dashboard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the dashboard: page views, redirects and the live pusher socket
    Serve {
        /// Port to serve on (overrides [server] port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Open a browser once the server is up
        #[arg(long)]
        open: bool,

        /// Enable dev mode (permissive CORS, listen on all interfaces)
        #[arg(long)]
        dev: bool,
    },
    /// Resolve a dashboard path and print the result as JSON
    Resolve {
        /// Browser path, e.g. /v2/find_build/<id> or /projects/server
        path: String,

        /// Report deferred redirects instead of looking them up
        #[arg(long)]
        no_follow: bool,
    },
    /// Watch several projects' commits in the terminal
    Pusher {
        /// Project slug; repeat for more columns. The first one drives the rows.
        #[arg(short = 'p', long = "project")]
        projects: Vec<String>,

        /// Only show commits on this branch
        #[arg(short, long)]
        branch: Option<String>,

        /// Legacy `<slug>::<branch>` selector; ignored when --project is given
        #[arg(long = "main")]
        main: Vec<String>,

        /// Commits fetched per project
        #[arg(long)]
        per_page: Option<u32>,

        /// Exit after this many completed rounds
        #[arg(long)]
        rounds: Option<u64>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default dashboard.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(changes_dash::config::DEFAULT_CONFIG_PATH));

    // Config commands report missing or broken files themselves.
    let command = match cli.command {
        Commands::Config { command } => return cmd::cmd_config(&config_path, command),
        other => other,
    };

    let config = DashConfig::resolve(Some(&config_path))?;
    let _log_guard = init_logging(&config.logging, cli.verbose)?;

    match command {
        Commands::Serve { port, open, dev } => {
            cmd::cmd_serve(&config, port, open, dev).await?;
        }
        Commands::Resolve { path, no_follow } => {
            cmd::cmd_resolve(&config, &path, !no_follow).await?;
        }
        Commands::Pusher {
            projects,
            branch,
            main,
            per_page,
            rounds,
        } => {
            let selection = cmd::PusherSelection {
                projects,
                branch,
                main,
                per_page,
            };
            cmd::cmd_pusher(&config, selection, rounds).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
