//! Recipient-major delivery with per-task failure capture
//!
//! Delivery is a flat task list (recipient × artifact). Every task runs
//! exactly once regardless of earlier failures; outcomes are aggregated
//! into a [`DeliveryReport`] for the operator log. One recipient's failure
//! never blocks another recipient, and one artifact's failure never blocks
//! the remaining artifacts for the same recipient.

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::error::DeliveryError;
use crate::payload::AlertPayload;
use crate::telegram::AlertTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Text,
    Voice,
    Document,
}

/// Outcome of one (recipient, artifact) send.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub chat_id: i64,
    pub artifact: Artifact,
    /// `None` on success, the error rendering on failure.
    pub error: Option<String>,
}

impl DeliveryAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReport {
    pub fn succeeded(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempts.len() - self.succeeded()
    }
}

/// Deliver every artifact of `payload` to every recipient.
///
/// When synthesis produced no clip, the voice task is recorded as failed
/// for every recipient without a network call, so the report still shows
/// that a voice artifact was intended; text and document go out normally.
#[instrument(skip(transport, payload), fields(recipients = chat_ids.len()))]
pub async fn deliver_all(
    transport: &dyn AlertTransport,
    payload: &AlertPayload,
    chat_ids: &[i64],
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for &chat_id in chat_ids {
        let text = transport.send_text(chat_id, &payload.message).await;
        record(&mut report, chat_id, Artifact::Text, text);

        match &payload.voice {
            Some(clip) => {
                let voice = transport.send_voice(chat_id, clip.clone()).await;
                record(&mut report, chat_id, Artifact::Voice, voice);
            }
            None => record(
                &mut report,
                chat_id,
                Artifact::Voice,
                Err(DeliveryError::Synthesis("no voice clip available".into())),
            ),
        }

        let document = transport
            .send_document(chat_id, &payload.document_name, payload.document.clone())
            .await;
        record(&mut report, chat_id, Artifact::Document, document);
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "delivery finished"
    );
    report
}

fn record(
    report: &mut DeliveryReport,
    chat_id: i64,
    artifact: Artifact,
    outcome: Result<(), DeliveryError>,
) {
    if let Err(e) = &outcome {
        error!(chat_id, ?artifact, "send failed: {e}");
    }
    report.attempts.push(DeliveryAttempt {
        chat_id,
        artifact,
        error: outcome.err().map(|e| e.to_string()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FlakyTransport {
        fail: HashSet<(i64, Artifact)>,
        log: Mutex<Vec<(i64, Artifact)>>,
    }

    impl FlakyTransport {
        fn new(fail: &[(i64, Artifact)]) -> Self {
            Self {
                fail: fail.iter().copied().collect(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn attempt(&self, chat_id: i64, artifact: Artifact) -> Result<(), DeliveryError> {
            self.log.lock().unwrap().push((chat_id, artifact));
            if self.fail.contains(&(chat_id, artifact)) {
                Err(DeliveryError::Api {
                    status: 502,
                    body: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl AlertTransport for FlakyTransport {
        async fn send_text(&self, chat_id: i64, _body: &str) -> Result<(), DeliveryError> {
            self.attempt(chat_id, Artifact::Text)
        }

        async fn send_voice(&self, chat_id: i64, _clip: Vec<u8>) -> Result<(), DeliveryError> {
            self.attempt(chat_id, Artifact::Voice)
        }

        async fn send_document(
            &self,
            chat_id: i64,
            _file_name: &str,
            _file: Vec<u8>,
        ) -> Result<(), DeliveryError> {
            self.attempt(chat_id, Artifact::Document)
        }
    }

    fn payload(voice: bool) -> AlertPayload {
        AlertPayload {
            message: "msg".into(),
            voice: voice.then(|| vec![0u8; 4]),
            document: vec![1u8; 8],
            document_name: "cause_MARKED_2025_1_13.pdf".into(),
        }
    }

    #[tokio::test]
    async fn one_recipient_failure_does_not_block_others() {
        let transport = FlakyTransport::new(&[(1, Artifact::Text)]);
        let report = deliver_all(&transport, &payload(true), &[1, 2]).await;

        assert_eq!(report.attempts.len(), 6);
        assert_eq!(report.failed(), 1);

        // Recipient 2 still saw all three artifact attempts.
        let log = transport.log.lock().unwrap();
        let for_two: Vec<_> = log.iter().filter(|(id, _)| *id == 2).collect();
        assert_eq!(for_two.len(), 3);
    }

    #[tokio::test]
    async fn artifact_failure_does_not_block_remaining_artifacts() {
        let transport = FlakyTransport::new(&[(7, Artifact::Voice)]);
        let report = deliver_all(&transport, &payload(true), &[7]).await;

        assert_eq!(report.failed(), 1);
        let log = transport.log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                (7, Artifact::Text),
                (7, Artifact::Voice),
                (7, Artifact::Document)
            ]
        );
    }

    #[tokio::test]
    async fn delivery_is_recipient_major() {
        let transport = FlakyTransport::new(&[]);
        deliver_all(&transport, &payload(true), &[1, 2]).await;

        let log = transport.log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                (1, Artifact::Text),
                (1, Artifact::Voice),
                (1, Artifact::Document),
                (2, Artifact::Text),
                (2, Artifact::Voice),
                (2, Artifact::Document),
            ]
        );
    }

    #[tokio::test]
    async fn missing_voice_clip_is_reported_failed_without_sending() {
        let transport = FlakyTransport::new(&[]);
        let report = deliver_all(&transport, &payload(false), &[3, 4]).await;

        // Every recipient still has a voice entry, marked failed.
        assert_eq!(report.attempts.len(), 6);
        let voice: Vec<_> = report
            .attempts
            .iter()
            .filter(|a| a.artifact == Artifact::Voice)
            .collect();
        assert_eq!(voice.len(), 2);
        assert!(voice.iter().all(|a| !a.succeeded()));

        // No network attempt was made for the missing clip.
        let log = transport.log.lock().unwrap();
        assert!(log.iter().all(|(_, artifact)| *artifact != Artifact::Voice));
    }

    #[test]
    fn report_serializes_for_the_operator_log() {
        let report = DeliveryReport {
            attempts: vec![DeliveryAttempt {
                chat_id: 9,
                artifact: Artifact::Document,
                error: Some("API returned 502: boom".into()),
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"document\""));
        assert!(json.contains("502"));
    }
}
