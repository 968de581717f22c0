use anyhow::Result;
use std::sync::Arc;

use startrail::collector::{CollectReport, Collector, HistorySweep};
use startrail::config::Config;

use super::{build_collector, open_repository};

/// Run one trending collection and print the outcome
pub async fn collect(config: Config) -> Result<()> {
    let collector = build_collector(&config, open_repository(&config)?)?;

    println!("Collecting projects with more than {} stars", config.collector.min_stars);
    let report = collector.collect_trending_repos().await;
    print_collect(&report);

    if let Some(err) = report.search_error {
        anyhow::bail!("Search failed: {err}");
    }
    Ok(())
}

/// Run one history sweep; Ctrl+C stops it after the current project
pub async fn history(config: Config) -> Result<()> {
    let collector = build_collector(&config, open_repository(&config)?)?;
    let sweep = sweep_with_interrupt(&collector).await;
    print_sweep(&sweep);
    Ok(())
}

/// Collect, then sweep history
pub async fn run_once(config: Config) -> Result<()> {
    let collector = build_collector(&config, open_repository(&config)?)?;

    let report = collector.collect_trending_repos().await;
    print_collect(&report);

    let sweep = sweep_with_interrupt(&collector).await;
    print_sweep(&sweep);
    Ok(())
}

async fn sweep_with_interrupt(collector: &Arc<Collector>) -> HistorySweep {
    let watcher = {
        let collector = Arc::clone(collector);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nInterrupt received, stopping after the current project...");
                collector.cancel_sweep();
            }
        })
    };

    let sweep = collector.update_history().await;
    watcher.abort();
    sweep
}

fn print_collect(report: &CollectReport) {
    println!("Collection for {}", report.run_date);
    println!("==========================");
    println!("  Returned: {}", report.projects.len());
    println!("  Stored:   {}", report.succeeded());
    println!("  Failed:   {}", report.failed());
    if let Some(err) = &report.search_error {
        println!("  Search error: {err}");
    }
    for (id, outcome) in report.outcomes.iter().filter(|(_, o)| !o.is_success()) {
        println!("    project {id}: {outcome:?}");
    }
}

fn print_sweep(sweep: &HistorySweep) {
    println!("History sweep");
    println!("=============");
    println!("  Projects: {}", sweep.total_projects);
    println!("  Pages:    {}/{}", sweep.pages.len(), sweep.total_pages);
    println!("  Stored:   {}", sweep.succeeded());
    println!("  Failed:   {}", sweep.failed());
    if sweep.cancelled {
        println!("  Stopped early on request");
    }
    for page in sweep.pages.iter().filter(|p| p.error.is_some()) {
        if let Some(err) = &page.error {
            println!("    page {}: {err}", page.page);
        }
    }
}
