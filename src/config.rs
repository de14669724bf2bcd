//! FlowGuard configuration management

use crate::classifier::ClassificationRule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main FlowGuard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGuardConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Policy loading configuration
    #[serde(default)]
    pub policies: PoliciesConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Delegation configuration (notification webhook, timeouts)
    #[serde(default)]
    pub delegation: DelegationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8900,
        }
    }
}

/// Where policy documents are loaded from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesConfig {
    /// Directory of JSON policy documents, one per file
    pub dir: PathBuf,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("policies"),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Append-only JSONL audit log
    pub log_path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("flowguard-audit.jsonl"),
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Custom classification rules added to the builtin matchers
    #[serde(default)]
    pub custom_rules: Vec<ClassificationRule>,
}

/// External delegation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    /// Webhook URL for flag/notify/escalate events; none disables delivery
    pub webhook_url: Option<String>,

    /// Timeout in milliseconds for delegated calls
    pub timeout_ms: u64,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 5000,
        }
    }
}

impl FlowGuardConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_toml() {
        let config = FlowGuardConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: FlowGuardConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server.port, 8900);
        assert_eq!(parsed.policies.dir, PathBuf::from("policies"));
        assert!(parsed.delegation.webhook_url.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: FlowGuardConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [[classifier.custom_rules]]
            name = "employee-id"
            pattern = "\\bEMP-\\d{6}\\b"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.audit.log_path, PathBuf::from("flowguard-audit.jsonl"));
        assert_eq!(config.classifier.custom_rules.len(), 1);
        assert_eq!(config.classifier.custom_rules[0].name, "employee-id");
    }
}
