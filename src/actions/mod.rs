//! Action resolver: maps decisions to remediation outcomes
//!
//! Data-transforming actions (anonymize, pseudonymize, redact) are pure
//! functions of the decision and record, so a retry over the same input
//! yields the same transformed output. Delegating actions (encrypt, flag,
//! notify, escalate) call external collaborators with a bounded timeout.

mod external;

pub use external::{EncryptionProvider, NotificationEvent, Notifier, WebhookNotifier};

#[cfg(test)]
pub use external::testing;

use crate::classifier::{Category, Finding};
use crate::policy::Action;
use crate::record::Record;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Result of applying one action
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// False when a delegated call failed or timed out
    pub success: bool,
    /// Human-readable account of what happened
    pub detail: String,
    /// True when the whole record was quarantined
    pub quarantined: bool,
}

impl ApplyResult {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
            quarantined: false,
        }
    }

    fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
            quarantined: false,
        }
    }
}

/// Inputs identifying the decision being applied
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub policy_id: &'a str,
    pub rule_id: &'a str,
    pub message: &'a str,
}

/// Applies remediation actions to records
pub struct ActionResolver {
    encryption: Option<Arc<dyn EncryptionProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
    delegate_timeout: Duration,
}

impl ActionResolver {
    pub fn new() -> Self {
        Self {
            encryption: None,
            notifier: None,
            delegate_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_encryption(mut self, provider: Arc<dyn EncryptionProvider>) -> Self {
        self.encryption = Some(provider);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_delegate_timeout(mut self, timeout: Duration) -> Self {
        self.delegate_timeout = timeout;
        self
    }

    /// Apply one action over the affected fields, mutating `transformed`
    /// in place for data-transforming actions.
    pub async fn apply(
        &self,
        ctx: ApplyContext<'_>,
        action: Action,
        fields: &[String],
        findings: &[Finding],
        transformed: &mut Record,
    ) -> ApplyResult {
        match action {
            Action::Anonymize => {
                for field in fields {
                    anonymize_field(transformed, field, findings);
                }
                ApplyResult::ok(format!("anonymized: {}", fields.join(", ")))
            }
            Action::Redact => {
                for field in fields {
                    redact_field(transformed, field, findings);
                }
                ApplyResult::ok(format!("redacted: {}", fields.join(", ")))
            }
            Action::Pseudonymize => {
                for field in fields {
                    pseudonymize_field(transformed, field);
                }
                ApplyResult::ok(format!("pseudonymized: {}", fields.join(", ")))
            }
            Action::Encrypt => self.apply_encrypt(fields, transformed).await,
            Action::Flag | Action::Notify | Action::Escalate => {
                self.apply_notify(ctx, action, fields).await
            }
            Action::Deny => ApplyResult::ok("denied by policy"),
            Action::Allow => ApplyResult::ok("allowed by policy"),
            Action::LogOnly => ApplyResult::ok("logged for audit"),
            Action::Quarantine => ApplyResult {
                success: true,
                detail: "record quarantined pending review".to_string(),
                quarantined: true,
            },
        }
    }

    async fn apply_encrypt(&self, fields: &[String], transformed: &mut Record) -> ApplyResult {
        let provider = match &self.encryption {
            Some(provider) => provider,
            None => {
                // No provider configured: return the instruction only, the
                // caller performs the encryption itself
                return ApplyResult::ok(format!(
                    "fields marked for caller-side encryption: {}",
                    fields.join(", ")
                ));
            }
        };

        for field in fields {
            let plaintext = match transformed.get(field) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => continue,
            };
            let encrypted =
                tokio::time::timeout(self.delegate_timeout, provider.encrypt(field, &plaintext))
                    .await;
            match encrypted {
                Ok(Ok(ciphertext)) => {
                    transformed.set(field, Value::String(ciphertext));
                }
                Ok(Err(e)) => {
                    return ApplyResult::failed(format!("encryption failed for {}: {}", field, e))
                }
                Err(_) => {
                    return ApplyResult::failed(format!(
                        "encryption timed out for {} after {:?}",
                        field, self.delegate_timeout
                    ))
                }
            }
        }
        ApplyResult::ok(format!("encrypted: {}", fields.join(", ")))
    }

    async fn apply_notify(
        &self,
        ctx: ApplyContext<'_>,
        action: Action,
        fields: &[String],
    ) -> ApplyResult {
        let notifier = match &self.notifier {
            Some(notifier) => notifier,
            None => return ApplyResult::ok(ctx.message.to_string()),
        };

        let event = NotificationEvent {
            policy_id: ctx.policy_id.to_string(),
            rule_id: ctx.rule_id.to_string(),
            action: action.to_string(),
            fields: fields.to_vec(),
            message: ctx.message.to_string(),
        };
        match tokio::time::timeout(self.delegate_timeout, notifier.notify(&event)).await {
            Ok(Ok(())) => ApplyResult::ok(ctx.message.to_string()),
            Ok(Err(e)) => ApplyResult::failed(format!("notification failed: {}", e)),
            Err(_) => ApplyResult::failed(format!(
                "notification timed out after {:?}",
                self.delegate_timeout
            )),
        }
    }
}

impl Default for ActionResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder text for a redacted span of the given category
fn placeholder(category: &Category) -> &'static str {
    match category {
        Category::Email => "[EMAIL]",
        Category::Phone => "[PHONE]",
        Category::NationalId => "[ID]",
        Category::PaymentCard => "[CARD]",
        _ => "[REDACTED]",
    }
}

/// Replace the whole field value with the fixed placeholder
fn anonymize_field(record: &mut Record, field: &str, _findings: &[Finding]) {
    record.set(field, Value::String("[REDACTED]".to_string()));
}

/// Replace matched spans within a string value; whole value otherwise.
///
/// Span replacement walks matches back-to-front so earlier offsets stay
/// valid. Applying redaction to an already-redacted value is a no-op, since
/// placeholders produce no findings.
fn redact_field(record: &mut Record, field: &str, findings: &[Finding]) {
    let mut spans: Vec<(usize, usize, &Category)> = findings
        .iter()
        .filter(|f| f.field == field)
        .filter_map(|f| f.span.map(|(start, end)| (start, end, &f.category)))
        .collect();

    let original = match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        // Non-string values carry no spans to cut; replace wholesale.
        // The replacement is itself a string, so a second pass no-ops.
        Some(_) => {
            record.set(field, Value::String("[REDACTED]".to_string()));
            return;
        }
        None => return,
    };

    // A string with nothing matched in it has nothing to redact
    if spans.is_empty() {
        return;
    }

    spans.sort_by(|a, b| b.0.cmp(&a.0));
    let mut redacted = original;
    let mut last_start = usize::MAX;
    for (start, end, category) in spans {
        // Overlapping spans: the later replacement already covered this one
        if end > last_start || end > redacted.len() {
            continue;
        }
        redacted.replace_range(start..end, placeholder(category));
        last_start = start;
    }
    record.set(field, Value::String(redacted));
}

/// Replace the field value with a deterministic, non-reversible token
fn pseudonymize_field(record: &mut Record, field: &str) {
    let value = match record.get(field) {
        Some(v) => v.to_string(),
        None => return,
    };
    let digest = Sha256::digest(format!("{}:{}", field, value).as_bytes());
    let token = format!("tok_{}", URL_SAFE_NO_PAD.encode(&digest[..12]));
    record.set(field, Value::String(token));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn ctx() -> ApplyContext<'static> {
        ApplyContext {
            policy_id: "p1",
            rule_id: "r1",
            message: "sensitive content found",
        }
    }

    #[tokio::test]
    async fn test_anonymize_replaces_whole_value() {
        let resolver = ActionResolver::new();
        let mut rec = record(json!({"email": "a@b.com"}));
        let result = resolver
            .apply(ctx(), Action::Anonymize, &["email".to_string()], &[], &mut rec)
            .await;
        assert!(result.success);
        assert_eq!(rec.get("email"), Some(&json!("[REDACTED]")));
    }

    #[tokio::test]
    async fn test_redact_replaces_matched_span() {
        let resolver = ActionResolver::new();
        let classifier = Classifier::new();
        let mut rec = record(json!({"note": "reach me at a@b.com thanks"}));
        let findings = classifier.classify(&rec);
        resolver
            .apply(ctx(), Action::Redact, &["note".to_string()], &findings, &mut rec)
            .await;
        assert_eq!(rec.get("note"), Some(&json!("reach me at [EMAIL] thanks")));
    }

    #[tokio::test]
    async fn test_redact_idempotent() {
        let resolver = ActionResolver::new();
        let classifier = Classifier::new();
        let mut rec = record(json!({"note": "ssn 123-45-6789"}));

        let findings = classifier.classify(&rec);
        resolver
            .apply(ctx(), Action::Redact, &["note".to_string()], &findings, &mut rec)
            .await;
        let once = rec.clone();

        let findings = classifier.classify(&rec);
        resolver
            .apply(ctx(), Action::Redact, &["note".to_string()], &findings, &mut rec)
            .await;
        assert_eq!(rec, once);
        assert_eq!(rec.get("note"), Some(&json!("ssn [ID]")));
    }

    #[tokio::test]
    async fn test_pseudonymize_deterministic() {
        let resolver = ActionResolver::new();
        let mut a = record(json!({"user": "jo@example.com"}));
        let mut b = record(json!({"user": "jo@example.com"}));
        resolver
            .apply(ctx(), Action::Pseudonymize, &["user".to_string()], &[], &mut a)
            .await;
        resolver
            .apply(ctx(), Action::Pseudonymize, &["user".to_string()], &[], &mut b)
            .await;
        assert_eq!(a.get("user"), b.get("user"));
        let token = a.get("user").unwrap().as_str().unwrap();
        assert!(token.starts_with("tok_"));
        assert!(!token.contains("example.com"));
    }

    #[tokio::test]
    async fn test_encrypt_without_provider_returns_instruction() {
        let resolver = ActionResolver::new();
        let mut rec = record(json!({"card": "4111111111111111"}));
        let result = resolver
            .apply(ctx(), Action::Encrypt, &["card".to_string()], &[], &mut rec)
            .await;
        assert!(result.success);
        assert!(result.detail.contains("caller-side encryption"));
        // Value untouched: the engine holds no key material
        assert_eq!(rec.get("card"), Some(&json!("4111111111111111")));
    }

    #[tokio::test]
    async fn test_encrypt_with_provider() {
        let provider = Arc::new(testing::FakeEncryption::default());
        let resolver = ActionResolver::new().with_encryption(provider.clone());
        let mut rec = record(json!({"card": "4111111111111111"}));
        let result = resolver
            .apply(ctx(), Action::Encrypt, &["card".to_string()], &[], &mut rec)
            .await;
        assert!(result.success);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rec.get("card"), Some(&json!("enc(card:16)")));
    }

    #[tokio::test]
    async fn test_encrypt_timeout_fails_decision_only() {
        let resolver = ActionResolver::new()
            .with_encryption(Arc::new(testing::StalledEncryption))
            .with_delegate_timeout(Duration::from_millis(20));
        let mut rec = record(json!({"card": "4111111111111111"}));
        let result = resolver
            .apply(ctx(), Action::Encrypt, &["card".to_string()], &[], &mut rec)
            .await;
        assert!(!result.success);
        assert!(result.detail.contains("timed out"));
    }

    #[tokio::test]
    async fn test_notify_records_event() {
        let notifier = Arc::new(testing::RecordingNotifier::default());
        let resolver = ActionResolver::new().with_notifier(notifier.clone());
        let mut rec = record(json!({"amount": 15000}));
        let result = resolver
            .apply(ctx(), Action::Escalate, &["amount".to_string()], &[], &mut rec)
            .await;
        assert!(result.success);
        let events = notifier.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "escalate");
        assert_eq!(events[0].policy_id, "p1");
    }

    #[tokio::test]
    async fn test_notifier_failure_marks_apply_failed() {
        let resolver = ActionResolver::new().with_notifier(Arc::new(testing::FailingNotifier));
        let mut rec = record(json!({"amount": 15000}));
        let result = resolver
            .apply(ctx(), Action::Flag, &["amount".to_string()], &[], &mut rec)
            .await;
        assert!(!result.success);
        assert!(result.detail.contains("notification failed"));
    }

    #[tokio::test]
    async fn test_quarantine_marks_record() {
        let resolver = ActionResolver::new();
        let mut rec = record(json!({"x": 1}));
        let result = resolver
            .apply(ctx(), Action::Quarantine, &[], &[], &mut rec)
            .await;
        assert!(result.success);
        assert!(result.quarantined);
    }
}
