//! causewatch - daily cause-list watcher
//!
//! One invocation checks one date: fetch the published list, match the
//! watchlist, and alert recipients over Telegram with a text summary, a
//! voice clip, and an annotated copy of the list. Stateless across runs;
//! meant to be driven by a scheduler.
//!
//! Exit status is non-zero only for missing configuration. "No list
//! today", "no match", and partial delivery failures are all successful
//! runs from the scheduler's point of view.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info};

mod config;
mod pipeline;

use config::Config;
use pipeline::RunOutcome;

#[derive(Parser, Debug)]
#[command(name = "causewatch", about = "Check the daily cause list for watched cases")]
pub struct Args {
    /// Check an explicit date (YYYY-MM-DD) instead of today
    #[arg(long, conflicts_with = "offset_days")]
    pub date: Option<NaiveDate>,

    /// Check today shifted by this many days (e.g. -1 for yesterday)
    #[arg(long)]
    pub offset_days: Option<i64>,

    /// Case identifier to watch; repeat for multiple (defaults to the
    /// built-in watchlist)
    #[arg(long = "case")]
    pub cases: Vec<String>,

    /// Override the portal base URL
    #[arg(long)]
    pub site_base: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("causewatch=info".parse()?)
                .add_directive("alert_delivery=info".parse()?)
                .add_directive("portal_fetch=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // The only fatal condition: missing credential or recipients.
    let config = Config::load(args)?;

    match pipeline::run(&config).await {
        Ok(RunOutcome::NoDocument) => info!("done: no document for the date"),
        Ok(RunOutcome::NoMatch) => info!("done: no watchlist match"),
        Ok(RunOutcome::Notified(report)) => info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "done: alerts dispatched"
        ),
        // Content-pipeline failures are absorbed; the scheduler retries
        // on its own cadence.
        Err(e) => error!("run aborted: {e:#}"),
    }

    Ok(())
}
