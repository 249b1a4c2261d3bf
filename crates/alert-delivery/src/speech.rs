//! Spoken alert synthesis
//!
//! Uses the public Google Translate text-to-speech endpoint, which returns
//! an MP3 clip for a short text. Template and voice are fixed; the caller
//! degrades to text-and-document delivery if synthesis fails.

use reqwest::Client;
use tracing::{debug, instrument};

use causelist_core::TargetDate;

use crate::error::DeliveryError;

const TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";
const TTS_LANGUAGE: &str = "en";

/// Deterministic spoken-alert text for a set of matched cases.
pub fn alert_script(found: &[String], date: &TargetDate) -> String {
    format!(
        "Alert. Your court case {} is listed today, {}.",
        found.join(", "),
        date.spoken()
    )
}

/// Synthesize `text` into an MP3 clip.
#[instrument(skip(client, text))]
pub async fn synthesize(client: &Client, text: &str) -> Result<Vec<u8>, DeliveryError> {
    let response = client
        .get(TTS_ENDPOINT)
        .query(&[
            ("ie", "UTF-8"),
            ("client", "tw-ob"),
            ("tl", TTS_LANGUAGE),
            ("q", text),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DeliveryError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let clip = response.bytes().await?.to_vec();
    if clip.is_empty() {
        return Err(DeliveryError::Synthesis("empty audio response".into()));
    }
    debug!(bytes = clip.len(), "voice clip synthesized");
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn script_names_cases_and_date() {
        let date = TargetDate::from_date(NaiveDate::from_ymd_opt(2025, 1, 13).unwrap());
        let script = alert_script(&["141/24/MR".to_string()], &date);
        assert_eq!(
            script,
            "Alert. Your court case 141/24/MR is listed today, 13 January 2025."
        );
    }

    #[test]
    fn script_joins_multiple_cases() {
        let date = TargetDate::from_date(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        let script = alert_script(&["1/1/A".to_string(), "2/2/B".to_string()], &date);
        assert!(script.contains("1/1/A, 2/2/B"));
    }
}
