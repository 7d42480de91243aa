// src/notify/telegram.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;

use super::{render::render_markdown, Notifier};
use crate::digest::SummaryGroup;

/// Bot API limit for one `sendMessage` text.
pub const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;
const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramSender {
    token: String,
    chat_id: String,
    client: Client,
    api_base: String,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramSender {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            client: Client::new(),
            api_base: API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// Point at another Bot API host (self-hosted server, local mock).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }

    /// Markdown first; if Telegram rejects the markup, resend as plain text.
    async fn send_chunk(&self, text: &str) -> Result<()> {
        let md = json!({ "chat_id": self.chat_id, "text": text, "parse_mode": "Markdown" });
        match self.post_with_retry(&md).await {
            Ok(()) => Ok(()),
            Err(SendError::Rejected(status)) => {
                tracing::warn!(?status, "telegram rejected Markdown; retrying as plain text");
                let plain = json!({ "chat_id": self.chat_id, "text": text });
                self.post_with_retry(&plain)
                    .await
                    .map_err(|e| anyhow!("telegram sendMessage failed (markdown: {status}, plain: {e})"))
            }
            Err(e) => Err(anyhow!("telegram sendMessage failed: {e}")),
        }
    }

    /// Transport errors, 429 and 5xx are retried with exponential backoff;
    /// other 4xx come back as `Rejected` straight away.
    async fn post_with_retry(&self, body: &serde_json::Value) -> Result<(), SendError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(self.api_url("sendMessage"))
                .timeout(self.timeout)
                .json(body)
                .send()
                .await;

            let err = match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    if !is_retryable(status) {
                        return Err(SendError::Rejected(status));
                    }
                    SendError::Status(status)
                }
                Err(e) => SendError::Transport(e.to_string()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[derive(Debug)]
enum SendError {
    Rejected(StatusCode),
    Status(StatusCode),
    Transport(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Rejected(s) | SendError::Status(s) => write!(f, "HTTP {s}"),
            SendError::Transport(e) => write!(f, "request failed: {e}"),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Notifier for TelegramSender {
    fn channel(&self) -> &str {
        "telegram"
    }

    async fn send(&self, groups: &[SummaryGroup]) -> Result<()> {
        self.send_text(&render_markdown(groups)).await
    }
}

/// Split on the last newline (else space) before `max_chars`; a run with
/// neither is hard-cut on a char boundary.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let limit = match remaining.char_indices().nth(max_chars) {
            Some((i, _)) => i,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let head = &remaining[..limit];
        let split_at = head
            .rfind('\n')
            .or_else(|| head.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
