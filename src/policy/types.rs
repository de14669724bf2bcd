//! Policy and rule types
//!
//! A policy is a named, immutable set of rules plus an enforcement mode.
//! Policies are loaded as whole documents and replaced wholesale on reload;
//! the engine never mutates one field-by-field.

use super::condition::Condition;
use serde::{Deserialize, Serialize};

/// Remediation action a matched rule resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Replace the matched field value with a fixed placeholder
    Anonymize,
    /// Replace the matched field value with a deterministic token
    Pseudonymize,
    /// Mark the field for caller-side encryption
    Encrypt,
    /// Signal a downstream reviewer; no transform
    Flag,
    /// Like flag, but binding under pre-decision mode
    Escalate,
    /// Caller must not proceed under pre-decision mode
    Deny,
    Allow,
    /// Replace the matched span with a placeholder
    Redact,
    /// Mark the whole record unusable until reviewed
    Quarantine,
    /// Notify an external system; no transform
    Notify,
    LogOnly,
}

impl Action {
    /// Whether this action produces a transformed record fragment
    pub fn transforms_data(&self) -> bool {
        matches!(self, Self::Anonymize | Self::Pseudonymize | Self::Redact)
    }

    /// Whether this action counts as a compliance violation when applied
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Deny | Self::Escalate | Self::Quarantine)
    }

    /// Whether this action delegates to an external collaborator
    pub fn delegates(&self) -> bool {
        matches!(self, Self::Encrypt | Self::Flag | Self::Notify | Self::Escalate)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Anonymize => "anonymize",
            Self::Pseudonymize => "pseudonymize",
            Self::Encrypt => "encrypt",
            Self::Flag => "flag",
            Self::Escalate => "escalate",
            Self::Deny => "deny",
            Self::Allow => "allow",
            Self::Redact => "redact",
            Self::Quarantine => "quarantine",
            Self::Notify => "notify",
            Self::LogOnly => "log-only",
        };
        f.write_str(name)
    }
}

/// Caller-facing label describing when decisions gate an external operation.
///
/// The engine has one evaluation algorithm; mode only tells the caller how
/// to sequence and interpret decisions. Under `PreDecision` the `deny` and
/// `escalate` actions carry binding force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementMode {
    Realtime,
    PreProcessing,
    PostProcessing,
    Scheduled,
    PreDecision,
}

/// A single rule: condition, action, severity, optional message template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique within the owning policy
    pub id: String,
    pub condition: Condition,
    pub action: Action,
    /// Ordinal used for conflict resolution; higher wins
    pub severity: u8,
    /// Optional message; `{field}` expands to the affected field list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A named policy: ordered rules, framework tags, enforcement mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub frameworks: Vec<String>,
    pub enforcement_mode: EnforcementMode,
    pub rules: Vec<Rule>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
