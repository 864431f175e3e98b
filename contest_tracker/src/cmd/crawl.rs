use crate::cmd::connect_database;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use contest_tracker_libs::{
    ingestion::IngestionCoordinator,
    models::{ContestFilter, Platform},
    schedule::Job,
    sources::{build_client, default_sources},
    storage::{ContestStore, PgStore},
};
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Platforms to crawl. All platforms are crawled when omitted.
    #[arg(long)]
    platform: Vec<Platform>,
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    source_timeout_secs: u64,
    /// Print upcoming contests after crawling
    #[arg(long)]
    show_upcoming: bool,
}

pub async fn run(args: CrawlArgs) -> Result<()> {
    let pool = connect_database().await?;
    let store = Arc::new(PgStore::new(pool));

    let timeout = Duration::from_secs(args.source_timeout_secs);
    let client = build_client(timeout).with_context(|| {
        let message = "Failed to build HTTP client.";
        tracing::error!(message);
        message
    })?;

    let sources = default_sources(client)
        .into_iter()
        .filter(|source| args.platform.is_empty() || args.platform.contains(&source.platform()))
        .collect();
    let coordinator = IngestionCoordinator::new(sources, store.clone()).with_timeout(timeout);
    coordinator.run().await?;

    if args.show_upcoming {
        let filter = ContestFilter {
            past: Some(false),
            platform: None,
        };
        let upcoming = store.list_contests(&filter, Utc::now()).await?;
        tracing::info!("{} upcoming contests", upcoming.len());
        for contest in upcoming.iter() {
            println!(
                "{}\t{}\t{}\t{} min\t{}",
                contest.start_time.to_rfc3339(),
                contest.platform,
                contest.name,
                contest.duration,
                contest.url
            );
        }
    }

    Ok(())
}
