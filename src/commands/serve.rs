use anyhow::{Context, Result};
use std::sync::Arc;

use startrail::config::Config;
use startrail::metrics;
use startrail::scheduler::CollectionScheduler;
use startrail::storage::{SharedProjectRepository, SharedSchemaInspector};
use startrail::web::{self, AppState};

use super::{build_collector, open_repository};

/// Command-line overrides for `serve`
pub struct ServeParams {
    pub host: Option<String>,
    pub port: Option<u16>,

    /// Serve views only, without the daily jobs
    pub no_scheduler: bool,
}

/// Start the scheduler and the HTTP server; stop both on Ctrl+C
pub async fn serve(mut config: Config, params: ServeParams) -> Result<()> {
    if let Some(host) = params.host {
        config.server.host = host;
    }
    if let Some(port) = params.port {
        config.server.port = port;
    }

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    let repo = open_repository(&config)?;
    let shared_repo: SharedProjectRepository = repo.clone();
    let inspector: SharedSchemaInspector = repo.clone();
    let mut state = AppState::new(shared_repo)?.with_inspector(inspector);

    let scheduler = if params.no_scheduler {
        None
    } else {
        let collector = build_collector(&config, repo)?;
        let scheduler = Arc::new(
            CollectionScheduler::new(collector, &config.scheduler)
                .context("Invalid scheduler configuration")?,
        );
        scheduler.start()?;
        state = state.with_scheduler(Arc::clone(&scheduler));
        Some(scheduler)
    };

    println!("startrail listening on http://{}", config.server.bind_address());
    println!(
        "  collect at {}, history at {}{}",
        config.scheduler.collect_time,
        config.scheduler.history_time,
        if scheduler.is_none() { " (scheduler disabled)" } else { "" }
    );

    web::serve(state, &config.server, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => println!("\nShutdown signal received, stopping..."),
            Err(e) => tracing::error!("Failed to wait for Ctrl+C: {}", e),
        }
    })
    .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await?;
    }

    println!("startrail stopped.");
    Ok(())
}
