//! Compliance scoring derived purely from the audit trail
//!
//! The scorer keeps no counters of its own. Every number it reports is
//! recomputed by replaying audit entries, so a score rebuilt from the log
//! file always equals the live one.

use crate::audit::{AuditEntry, AuditRecorder};
use crate::engine::decision::DecisionOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Coarse health banding over a compliance rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl ComplianceStatus {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 0.95 {
            Self::Excellent
        } else if rate >= 0.85 {
            Self::Good
        } else if rate >= 0.70 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceScore {
    /// 1.0 minus the violation share; 1.0 over an empty window
    pub compliance_rate: f64,
    pub violation_count: u64,
    pub total_evaluations: u64,
}

impl ComplianceScore {
    fn from_counts(violations: u64, total: u64) -> Self {
        let compliance_rate = if total == 0 {
            1.0
        } else {
            1.0 - violations as f64 / total as f64
        };
        Self {
            compliance_rate,
            violation_count: violations,
            total_evaluations: total,
        }
    }

    pub fn status(&self) -> ComplianceStatus {
        ComplianceStatus::from_rate(self.compliance_rate)
    }
}

/// Per-policy slice of the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub policy_id: String,
    pub total_evaluations: u64,
    pub violation_count: u64,
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub score: ComplianceScore,
    pub status: ComplianceStatus,
    pub policies: Vec<PolicySummary>,
    /// Applied-decision counts keyed by action name
    pub action_counts: BTreeMap<String, u64>,
    pub recent_entries: Vec<AuditEntry>,
}

/// Optional filter over the audit trail
#[derive(Debug, Clone, Default)]
pub struct ScoreFilter {
    pub framework: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ScoreFilter {
    fn accepts(&self, entry: &AuditEntry) -> bool {
        if let Some(framework) = &self.framework {
            if !entry
                .frameworks
                .iter()
                .any(|f| f.eq_ignore_ascii_case(framework))
            {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.decision.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.decision.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// Replays the audit log into compliance numbers
pub struct ComplianceScorer {
    recorder: Arc<AuditRecorder>,
}

impl ComplianceScorer {
    pub fn new(recorder: Arc<AuditRecorder>) -> Self {
        Self { recorder }
    }

    /// Score the filtered window. Superseded decisions never count: only
    /// the decision that actually carried the call matters.
    pub async fn score(&self, filter: &ScoreFilter) -> ComplianceScore {
        let mut total = 0u64;
        let mut violations = 0u64;
        for entry in self.effective_entries(filter).await {
            total += 1;
            if entry.decision.action.is_violation() {
                violations += 1;
            }
        }
        ComplianceScore::from_counts(violations, total)
    }

    /// Dashboard rollup over the filtered window
    pub async fn dashboard(&self, filter: &ScoreFilter) -> DashboardSummary {
        let entries = self.effective_entries(filter).await;

        let mut total = 0u64;
        let mut violations = 0u64;
        let mut per_policy: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        let mut action_counts: BTreeMap<String, u64> = BTreeMap::new();

        for entry in &entries {
            total += 1;
            let violation = entry.decision.action.is_violation();
            if violation {
                violations += 1;
            }
            let slot = per_policy.entry(entry.policy_id.clone()).or_default();
            slot.0 += 1;
            if violation {
                slot.1 += 1;
            }
            *action_counts
                .entry(entry.decision.action.to_string())
                .or_default() += 1;
        }

        let score = ComplianceScore::from_counts(violations, total);
        let policies = per_policy
            .into_iter()
            .map(|(policy_id, (total, violations))| PolicySummary {
                policy_id,
                total_evaluations: total,
                violation_count: violations,
                compliance_rate: ComplianceScore::from_counts(violations, total).compliance_rate,
            })
            .collect();

        let recent_entries = entries.iter().rev().take(10).cloned().collect();

        DashboardSummary {
            status: score.status(),
            score,
            policies,
            action_counts,
            recent_entries,
        }
    }

    async fn effective_entries(&self, filter: &ScoreFilter) -> Vec<AuditEntry> {
        self.recorder
            .read_since(0)
            .await
            .into_iter()
            .filter(|e| e.decision.outcome != DecisionOutcome::Superseded)
            .filter(|e| filter.accepts(e))
            .collect()
    }
}
