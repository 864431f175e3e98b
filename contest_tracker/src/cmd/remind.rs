use crate::cmd::{build_notifiers, connect_database};
use anyhow::{Context, Result};
use clap::Args;
use contest_tracker_libs::{
    reminder::ReminderScheduler, schedule::Job, sources::build_client, storage::PgStore,
};
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Debug, Args)]
pub struct RemindArgs {
    /// Write reminders to the log instead of sending them
    #[arg(long)]
    console: bool,
}

pub async fn run(args: RemindArgs) -> Result<()> {
    let pool = connect_database().await?;
    let store = Arc::new(PgStore::new(pool));

    let client = build_client(Duration::from_secs(30)).with_context(|| {
        let message = "Failed to build HTTP client.";
        tracing::error!(message);
        message
    })?;
    let (email, sms) = build_notifiers(client, args.console)?;

    let scheduler = ReminderScheduler::new(store, email, sms);
    scheduler.run().await
}
