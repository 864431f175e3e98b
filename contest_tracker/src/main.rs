mod cmd;
mod modules;

use crate::cmd::{
    crawl::{self, CrawlArgs},
    remind::{self, RemindArgs},
    server::{self, ServerArgs},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{env, str::FromStr};
use tokio::runtime::Builder;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, time::OffsetTime},
};

#[derive(Debug, Parser)]
#[command(name = "contest_tracker")]
#[command(about = "Programming contest schedule tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch contests from every platform once
    Crawl(CrawlArgs),
    /// Scan bookmarks and send due reminders once
    Remind(RemindArgs),
    /// Launch the API server with the periodic jobs
    Server(ServerArgs),
}

fn main() -> Result<()> {
    dotenv().ok();

    let log_level = env::var("RUST_LOG").unwrap_or(String::from("info"));
    let filter = EnvFilter::builder()
        .with_default_directive(
            LevelFilter::from_str(&log_level)
                .context("couldn't parse specified log level")?
                .into(),
        )
        .from_env_lossy();
    let format = fmt::format()
        .with_level(true)
        .with_target(true)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_timer(OffsetTime::local_rfc_3339().context("couldn't determine local offset")?);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(format)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    match Cli::parse().command {
        Commands::Crawl(args) => runtime.block_on(crawl::run(args)),
        Commands::Remind(args) => runtime.block_on(remind::run(args)),
        Commands::Server(args) => runtime.block_on(server::run(args)),
    }
    .context("command failed")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reject_zero_interval() {
        for flag in [
            "--ingest-interval-hours",
            "--reminder-interval-minutes",
            "--source-timeout-secs",
        ] {
            let parsed = Cli::try_parse_from(["contest_tracker", "server", flag, "0"]);
            assert!(parsed.is_err(), "{} 0 must be rejected", flag);
        }

        let parsed = Cli::try_parse_from(["contest_tracker", "crawl", "--source-timeout-secs", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_default_intervals() {
        let parsed = Cli::try_parse_from(["contest_tracker", "server"]).unwrap();
        assert!(matches!(parsed.command, Commands::Server(_)));
    }
}
