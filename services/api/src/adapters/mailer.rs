//! services/api/src/adapters/mailer.rs
//!
//! The Resend implementation of the `MailerService` port. Delivery is an HTTP
//! call; callers decide whether a send failure matters (the notification
//! trigger swallows it, the admin resend surfaces it).

use async_trait::async_trait;
use serde_json::json;
use skillstore_core::ports::{EmailMessage, MailerService, PortError, PortResult};
use tracing::info;

const DEFAULT_API_BASE: &str = "https://api.resend.com";

pub struct ResendMailer {
    http: reqwest::Client,
    api_key: Option<String>,
    from: String,
    api_base: String,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from: String) -> Self {
        Self::with_api_base(api_key, from, DEFAULT_API_BASE.to_string())
    }

    pub fn with_api_base(api_key: Option<String>, from: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from,
            api_base,
        }
    }
}

#[async_trait]
impl MailerService for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> PortResult<()> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PortError::Unexpected("RESEND_API_KEY not configured".to_string()))?;

        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(api_key)
            .json(&json!({
                "from": &self.from,
                "to": [&message.to],
                "subject": &message.subject,
                "html": &message.html,
            }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("mail request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "mail provider returned {}: {}",
                status, body
            )));
        }

        info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}
