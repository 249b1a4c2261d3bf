//! Run configuration
//!
//! Built once at startup from the environment and CLI flags, then passed
//! by reference into the pipeline. Missing credentials or recipients are
//! the only conditions that abort the process with a non-zero exit.

use anyhow::{bail, Context, Result};
use causelist_core::DateSelection;

use crate::Args;

/// The cases being watched when no `--case` flags are given.
const DEFAULT_WATCHLIST: &[&str] = &["288/06/IP"];

/// Default portal base for the daily court lists.
const DEFAULT_SITE_BASE: &str = "https://www.colchc.gov.lk/daily-court-lists";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub chat_ids: Vec<i64>,
    pub watchlist: Vec<String>,
    pub site_base: String,
    pub date_selection: DateSelection,
}

impl Config {
    /// Assemble the run configuration. Fails fast, before any network
    /// activity, when the credential or recipient list is absent.
    pub fn load(args: Args) -> Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .context("BOT_TOKEN is not set")?;

        let chat_ids_raw = std::env::var("CHAT_IDS")
            .ok()
            .filter(|c| !c.trim().is_empty())
            .context("CHAT_IDS is not set")?;
        let chat_ids = parse_chat_ids(&chat_ids_raw)?;
        if chat_ids.is_empty() {
            bail!("CHAT_IDS contains no recipients");
        }

        let watchlist = if args.cases.is_empty() {
            DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect()
        } else {
            args.cases
        };

        let date_selection = match (args.date, args.offset_days) {
            (Some(date), _) => DateSelection::Fixed(date),
            (None, Some(days)) => DateSelection::OffsetDays(days),
            (None, None) => DateSelection::Today,
        };

        Ok(Self {
            bot_token,
            chat_ids,
            watchlist,
            site_base: args
                .site_base
                .unwrap_or_else(|| DEFAULT_SITE_BASE.to_string()),
            date_selection,
        })
    }
}

/// Parse the comma-separated recipient list, skipping blank entries.
fn parse_chat_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .with_context(|| format!("invalid chat id: {part:?}"))
        })
        .collect()
}
