//! Enforcement decisions and call outcomes

use crate::policy::{Action, EnforcementMode};
use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a single decision was concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionOutcome {
    /// The action was applied (or returned as an instruction)
    Applied,
    /// The rule matched but lost conflict resolution on every affected field
    Superseded,
    /// Binding result returned to the caller, who gates the operation
    WouldApply,
    /// A delegated external call failed or timed out; recorded, not dropped
    ApplyFailed,
}

/// The resolved outcome of evaluating one rule against one record.
///
/// Decisions are produced fresh per call and never mutated after the
/// enforcement call returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub rule_id: String,
    pub action: Action,
    /// Affected field paths; empty for record-level decisions
    pub fields: Vec<String>,
    /// The rule's expanded message template
    pub message: String,
    /// Resolver account of what was done (or why it failed)
    #[serde(default)]
    pub detail: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: DecisionOutcome,
}

/// Caller identity attached to audit entries; opaque to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub caller_id: String,
    /// Correlates all audit entries of one enforcement call
    pub call_id: uuid::Uuid,
}

impl ActorContext {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            call_id: uuid::Uuid::new_v4(),
        }
    }
}

impl Default for ActorContext {
    fn default() -> Self {
        Self::new("anonymous")
    }
}

/// Result of one `enforce` call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementOutcome {
    pub policy_id: String,
    pub mode: EnforcementMode,
    /// Winning decisions in evaluation order; superseded ones are audited
    /// but not returned
    pub decisions: Vec<Decision>,
    /// Present when a data-transforming action fired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed_record: Option<Record>,
    /// The record as a whole was quarantined
    pub quarantined: bool,
}

impl EnforcementOutcome {
    /// Whether the caller must hold the operation: only `deny` and
    /// `escalate` carry binding force, and only under pre-decision mode.
    pub fn blocks_caller(&self) -> bool {
        self.mode == EnforcementMode::PreDecision
            && self.decisions.iter().any(|d| {
                matches!(d.action, Action::Deny | Action::Escalate)
                    && matches!(d.outcome, DecisionOutcome::Applied | DecisionOutcome::WouldApply)
            })
    }
}
