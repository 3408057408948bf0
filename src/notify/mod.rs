//! Outbound letter delivery
//!
//! `LetterSender` is the transport seam: the dispatcher resolves recipients
//! and marks delivery, a sender only moves the letter. Production posts to
//! the vault's notification webhook (which renders and emails the letter);
//! dev mode runs with the no-op sender.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::types::{PassageError, Result};

/// Transport seam for letter delivery
#[async_trait]
pub trait LetterSender: Send + Sync {
    /// Deliver one letter to one recipient address.
    ///
    /// Ok means the transport accepted the letter; the dispatcher marks a
    /// letter delivered only after this returns Ok.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// JSON payload posted to the notification webhook
#[derive(Debug, Serialize)]
struct LetterPayload<'a> {
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Sender that POSTs letters to a configured notification webhook
pub struct WebhookSender {
    url: String,
    client: reqwest::Client,
}

impl WebhookSender {
    /// Create a sender with a per-request timeout
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { url, client }
    }
}

#[async_trait]
impl LetterSender for WebhookSender {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let payload = LetterPayload {
            recipient,
            subject,
            body,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PassageError::Notify(format!("Letter send failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PassageError::Notify(format!(
                "Letter send rejected with status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Sender that drops letters, for running without a notification service
pub struct NoopSender;

#[async_trait]
impl LetterSender for NoopSender {
    async fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<()> {
        debug!(recipient = %recipient, subject = %subject, "Dropping letter (no sender configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = LetterPayload {
            recipient: "jordan@example.com",
            subject: "For when I'm gone",
            body: "Dear Jordan...",
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"recipient\":\"jordan@example.com\""));
        assert!(json.contains("\"subject\":\"For when I'm gone\""));
    }

    #[tokio::test]
    async fn test_noop_sender_accepts_everything() {
        let sender = NoopSender;
        assert!(sender
            .send("jordan@example.com", "Subject", "Body")
            .await
            .is_ok());
    }
}
