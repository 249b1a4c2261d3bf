//! The detection-and-alert pipeline
//!
//! resolve date -> fetch -> extract -> match -> (annotate || narrate) ->
//! deliver. A missing document or an empty match result ends the run
//! cleanly; annotation and synthesis failures degrade the payload instead
//! of aborting it.

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use alert_delivery::{
    alert_message, alert_script, deliver_all, synthesize, AlertPayload, AlertTransport,
    DeliveryReport, TelegramClient,
};
use causelist_core::{find_matches, TargetDate};
use causelist_pdf::{annotate_occurrences, extract_text};
use portal_fetch::{FetchOutcome, PortalFetcher};

use crate::config::Config;

/// How the run ended. All variants are a successful run.
#[derive(Debug)]
pub enum RunOutcome {
    /// No list was published for the target date.
    NoDocument,
    /// A list exists but contains none of the watched cases.
    NoMatch,
    /// Alerts were dispatched; the report carries per-task outcomes.
    Notified(DeliveryReport),
}

#[instrument(skip(config))]
pub async fn run(config: &Config) -> Result<RunOutcome> {
    let target = TargetDate::resolve(config.date_selection);
    let locator = target.locator(&config.site_base);
    info!(date = %target, url = %locator.url, "checking daily cause list");

    let fetcher = PortalFetcher::launch().await?;
    let fetched = fetcher.fetch(&locator).await;
    // Release the browser before the CPU-bound work either way.
    let _ = fetcher.close().await;

    let client = TelegramClient::new(config.bot_token.clone());
    process(config, &target, fetched?, &client).await
}

/// Everything after the fetch. Takes the fetch outcome and the transport
/// so the short-circuit branches run without a browser or network.
async fn process(
    config: &Config,
    target: &TargetDate,
    fetched: FetchOutcome,
    transport: &dyn AlertTransport,
) -> Result<RunOutcome> {
    let document = match fetched {
        FetchOutcome::NotPublished => {
            info!("no cause list published for {target}; nothing to do");
            return Ok(RunOutcome::NoDocument);
        }
        FetchOutcome::Retrieved(document) => document,
    };

    let extracted = extract_text(&document.bytes).context("extracting cause list text")?;
    alert_if_listed(config, target, document.bytes, &extracted.text, transport).await
}

/// Match the watchlist and, on a hit, build and deliver the alert payload.
async fn alert_if_listed(
    config: &Config,
    target: &TargetDate,
    document_bytes: Vec<u8>,
    text: &str,
    transport: &dyn AlertTransport,
) -> Result<RunOutcome> {
    let found = find_matches(text, &config.watchlist);
    if found.is_empty() {
        info!("no watched case listed on {target}");
        return Ok(RunOutcome::NoMatch);
    }
    info!(cases = ?found, "watched case found on the list");

    // Annotation and narration are independent of each other.
    let annotation_input = document_bytes.clone();
    let annotation_ids = found.clone();
    let annotation = tokio::task::spawn_blocking(move || {
        annotate_occurrences(&annotation_input, &annotation_ids)
    });

    let http = reqwest::Client::new();
    let script = alert_script(&found, target);
    let (annotated, voice) = tokio::join!(annotation, synthesize(&http, &script));

    let (delivered_bytes, document_name) = match annotated.context("annotation task panicked")? {
        Ok(marked) => {
            info!(marks = marked.total_marks, "cause list annotated");
            if !marked.unmarked.is_empty() {
                warn!(cases = ?marked.unmarked, "matched but not locatable on any page");
            }
            (marked.bytes, marked_document_name(target))
        }
        Err(e) => {
            // Deliver the original list rather than dropping the alert.
            error!("annotation failed, sending unmarked copy: {e}");
            (document_bytes, plain_document_name(target))
        }
    };

    let voice = match voice {
        Ok(clip) => Some(clip),
        Err(e) => {
            error!("voice synthesis failed, continuing without audio: {e}");
            None
        }
    };

    let payload = AlertPayload {
        message: alert_message(&found, target),
        voice,
        document: delivered_bytes,
        document_name,
    };

    let report = deliver_all(transport, &payload, &config.chat_ids).await;
    if report.failed() > 0 {
        warn!(
            failed = report.failed(),
            total = report.attempts.len(),
            "some deliveries failed"
        );
    }
    Ok(RunOutcome::Notified(report))
}

fn marked_document_name(target: &TargetDate) -> String {
    format!(
        "cause_MARKED_{}_{}_{}.pdf",
        target.year(),
        target.month(),
        target.day()
    )
}

fn plain_document_name(target: &TargetDate) -> String {
    format!(
        "cause_{}_{}_{}.pdf",
        target.year(),
        target.month(),
        target.day()
    )
}
