//! External collaborator seams for delegated actions
//!
//! The resolver holds no key material and sends no mail itself: `encrypt`
//! delegates to an `EncryptionProvider`, and `flag`/`notify`/`escalate`
//! delegate to a `Notifier`. Both are awaited with a bounded timeout;
//! failures surface on the decision, never as silent drops.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;

/// External key/encryption service invoked for `encrypt` actions
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    /// Encrypt a field's plaintext, returning ciphertext
    async fn encrypt(&self, field: &str, plaintext: &str) -> Result<String>;
}

/// An outbound notification produced by flag/notify/escalate actions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub policy_id: String,
    pub rule_id: String,
    pub action: String,
    pub fields: Vec<String>,
    pub message: String,
}

/// Downstream alerting channel for flag/notify/escalate actions
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

/// Notifier that posts events as JSON to a webhook URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| Error::ActionApplyFailed(format!("webhook send failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::ActionApplyFailed(format!(
                "webhook returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
