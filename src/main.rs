mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use startrail::config::Config;

use commands::ServeParams;

#[derive(Parser)]
#[command(
    name = "startrail",
    version,
    about = "Trending GitHub project collector with daily snapshots and star history",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily scheduler and the web views
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve views only, without scheduling collection jobs
        #[arg(long, default_value = "false")]
        no_scheduler: bool,
    },

    /// Collect trending projects once
    Collect,

    /// Append one history row per tracked project
    History,

    /// Collect, then update history
    RunOnce,

    /// Create the database and tables
    InitDb,

    /// Show database statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    // Initialize tracing/logging
    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.logging.format)
        .to_string();
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("startrail starting");

    match cli.command {
        Commands::Serve {
            host,
            port,
            no_scheduler,
        } => {
            tracing::info!(
                host = ?host,
                port = ?port,
                no_scheduler = %no_scheduler,
                "Starting serve command"
            );
            commands::serve(
                config,
                ServeParams {
                    host,
                    port,
                    no_scheduler,
                },
            )
            .await?;
        }

        Commands::Collect => {
            tracing::info!(min_stars = config.collector.min_stars, "Starting collect command");
            commands::collect(config).await?;
        }

        Commands::History => {
            tracing::info!("Starting history command");
            commands::history(config).await?;
        }

        Commands::RunOnce => {
            tracing::info!("Starting run-once command");
            commands::run_once(config).await?;
        }

        Commands::InitDb => {
            commands::init_db(config).await?;
        }

        Commands::Stats => {
            commands::stats(config).await?;
        }
    }

    tracing::info!("startrail completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => tracing_subscriber::EnvFilter::new("startrail=debug,info"),
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!("startrail={level},warn"))?,
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}
