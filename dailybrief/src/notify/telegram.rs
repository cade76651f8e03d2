use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;

use super::NotifyError;

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    /// Create a new Telegram client against the public Bot API
    pub fn new(client: Client, bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            api_url: "https://api.telegram.org".to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Point the client at another Bot API server (self-hosted or test double)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    /// Send an HTML-formatted text message
    pub async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true
            }))
            .send()
            .await?;

        check(resp).await
    }

    /// Send a file as a document with an HTML caption.
    /// The caption is sent as given; build it with `compose_caption` to stay within `CAPTION_LIMIT`.
    pub async fn send_document(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), NotifyError> {
        let document = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/markdown")?;

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("document", document);

        let resp = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        check(resp).await
    }
}

async fn check(resp: reqwest::Response) -> Result<(), NotifyError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(NotifyError::Api {
            service: "Telegram",
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}
