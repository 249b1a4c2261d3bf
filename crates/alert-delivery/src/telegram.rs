//! Telegram Bot API client
//!
//! Three operations, one HTTPS request each: `sendMessage` with Markdown
//! formatting, `sendVoice` and `sendDocument` as multipart uploads. No
//! batching and no internal retry; each send is attempted once per run.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::DeliveryError;

const API_BASE: &str = "https://api.telegram.org";

/// The outbound notification operations, behind a trait so delivery logic
/// can be exercised against an in-memory transport.
#[async_trait]
pub trait AlertTransport {
    async fn send_text(&self, chat_id: i64, body: &str) -> Result<(), DeliveryError>;
    async fn send_voice(&self, chat_id: i64, clip: Vec<u8>) -> Result<(), DeliveryError>;
    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        file: Vec<u8>,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    token: String,
    http: Client,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self {
            token,
            http: Client::new(),
        }
    }

    /// Use a preconfigured HTTP client (shared pools, test setups).
    pub fn with_client(token: String, http: Client) -> Self {
        Self { token, http }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    async fn check(response: reqwest::Response) -> Result<(), DeliveryError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertTransport for TelegramClient {
    #[instrument(skip(self, body))]
    async fn send_text(&self, chat_id: i64, body: &str) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .form(&[
                ("chat_id", chat_id.to_string()),
                ("text", body.to_string()),
                ("parse_mode", "Markdown".to_string()),
            ])
            .send()
            .await?;
        Self::check(response).await?;
        debug!("text sent");
        Ok(())
    }

    #[instrument(skip(self, clip))]
    async fn send_voice(&self, chat_id: i64, clip: Vec<u8>) -> Result<(), DeliveryError> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(
                "voice",
                Part::bytes(clip)
                    .file_name("alert.mp3")
                    .mime_str("audio/mpeg")?,
            );
        let response = self
            .http
            .post(self.method_url("sendVoice"))
            .multipart(form)
            .send()
            .await?;
        Self::check(response).await?;
        debug!("voice sent");
        Ok(())
    }

    #[instrument(skip(self, file))]
    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        file: Vec<u8>,
    ) -> Result<(), DeliveryError> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(
                "document",
                Part::bytes(file)
                    .file_name(file_name.to_string())
                    .mime_str("application/pdf")?,
            );
        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        Self::check(response).await?;
        debug!("document sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn method_url_embeds_token_and_method() {
        let client = TelegramClient::new("123:abc".to_string());
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }
}
