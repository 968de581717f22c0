use anyhow::Result;

use startrail::config::Config;
use startrail::storage::{ProjectRepository, SchemaInspector};

use super::open_repository;

/// Create the database file and both tables
pub async fn init_db(config: Config) -> Result<()> {
    let repo = open_repository(&config)?;
    let tables = tokio::task::spawn_blocking(move || repo.list_tables()).await??;

    println!("Database ready: {}", config.database.sqlite_path.display());
    for table in tables {
        println!("  {table}");
    }
    Ok(())
}

/// Print row counts and the latest collection date
pub async fn stats(config: Config) -> Result<()> {
    let repo = open_repository(&config)?;
    let (projects, history, latest) = tokio::task::spawn_blocking(move || {
        Ok::<_, anyhow::Error>((
            repo.count_projects()?,
            repo.count_history()?,
            repo.latest_collect_date()?,
        ))
    })
    .await??;

    println!("Database: {}", config.database.sqlite_path.display());
    println!("  Tracked projects: {projects}");
    println!("  History rows:     {history}");
    match latest {
        Some(date) => println!("  Latest snapshot:  {date}"),
        None => println!("  Latest snapshot:  none"),
    }
    Ok(())
}
