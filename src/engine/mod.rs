//! Evaluator: deterministic policy enforcement over data records
//!
//! One algorithm serves every enforcement mode: look up the active policy,
//! classify the record, evaluate candidate rules, resolve per-field
//! conflicts, apply the winners, and durably audit every decision before
//! returning. If the audit append fails the whole call fails; nothing is
//! reported as applied without its audit entry.

pub mod decision;

pub use decision::{ActorContext, Decision, DecisionOutcome, EnforcementOutcome};

use crate::actions::{ActionResolver, ApplyContext};
use crate::audit::{AuditRecorder, PendingEntry};
use crate::classifier::Classifier;
use crate::error::Result;
use crate::policy::{Action, EnforcementMode, PolicyStore, Rule};
use crate::record::Record;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// The policy enforcement engine
pub struct Engine {
    store: Arc<PolicyStore>,
    classifier: Classifier,
    resolver: ActionResolver,
    recorder: Arc<AuditRecorder>,
}

/// One matched rule with the fields its condition touched on this record
struct RuleMatch<'a> {
    source_idx: usize,
    rule: &'a Rule,
    fields: Vec<String>,
}

impl Engine {
    pub fn new(store: Arc<PolicyStore>, recorder: Arc<AuditRecorder>) -> Self {
        Self {
            store,
            classifier: Classifier::new(),
            resolver: ActionResolver::new(),
            recorder,
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_resolver(mut self, resolver: ActionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn recorder(&self) -> &Arc<AuditRecorder> {
        &self.recorder
    }

    /// Enforce a named policy against a record.
    ///
    /// Returns the winning decisions and, when a data-transforming action
    /// fired, the transformed copy of the record. Superseded rules are
    /// audited but not returned. The original record is never mutated.
    pub async fn enforce(
        &self,
        policy_id: &str,
        record: &Record,
        actor: ActorContext,
    ) -> Result<EnforcementOutcome> {
        let snapshot = self.store.snapshot().await;
        let compiled = snapshot.get_active(policy_id)?;
        let policy = &compiled.policy;

        let findings = self.classifier.classify(record);
        tracing::debug!(
            policy_id,
            findings = findings.len(),
            "evaluating record against policy"
        );

        let matches = evaluate_candidates(&compiled, record, &findings);
        if matches.is_empty() {
            // Silence is an implicit allow; nothing to apply, nothing to audit
            return Ok(EnforcementOutcome {
                policy_id: policy.id.clone(),
                mode: policy.enforcement_mode,
                decisions: Vec::new(),
                transformed_record: None,
                quarantined: false,
            });
        }

        let (winners, superseded) = resolve_conflicts(&matches);

        let mut transformed = record.clone();
        let mut quarantined = false;
        let mut decisions = Vec::new();

        for (match_idx, fields_won) in &winners {
            let m = &matches[*match_idx];
            let fields: Vec<String> = fields_won.iter().cloned().collect();
            let message = expand_message(m.rule, &fields);

            let result = self
                .resolver
                .apply(
                    ApplyContext {
                        policy_id: &policy.id,
                        rule_id: &m.rule.id,
                        message: &message,
                    },
                    m.rule.action,
                    &fields,
                    &findings,
                    &mut transformed,
                )
                .await;
            quarantined |= result.quarantined;

            let outcome = if !result.success {
                DecisionOutcome::ApplyFailed
            } else if policy.enforcement_mode == EnforcementMode::PreDecision
                && matches!(m.rule.action, Action::Deny | Action::Escalate)
            {
                // Binding under pre-decision mode: the caller gates the
                // operation, the engine itself blocks nothing
                DecisionOutcome::WouldApply
            } else {
                DecisionOutcome::Applied
            };

            decisions.push(Decision {
                rule_id: m.rule.id.clone(),
                action: m.rule.action,
                fields,
                message,
                detail: result.detail,
                timestamp: chrono::Utc::now(),
                outcome,
            });
        }

        let mut audited = decisions.clone();
        for match_idx in &superseded {
            let m = &matches[*match_idx];
            audited.push(Decision {
                rule_id: m.rule.id.clone(),
                action: m.rule.action,
                fields: m.fields.clone(),
                message: expand_message(m.rule, &m.fields),
                detail: "superseded by a higher-precedence rule".to_string(),
                timestamp: chrono::Utc::now(),
                outcome: DecisionOutcome::Superseded,
            });
        }

        // Durable audit before anything is reported back. A failed append
        // fails the call: an unaudited enforcement never happened.
        let fingerprint = record.fingerprint();
        for decision in &audited {
            self.recorder
                .append(PendingEntry {
                    policy_id: policy.id.clone(),
                    frameworks: policy.frameworks.clone(),
                    record_fingerprint: fingerprint.clone(),
                    decision: decision.clone(),
                    actor: actor.clone(),
                })
                .await?;
        }

        let transformed_record = if transformed != *record {
            Some(transformed)
        } else {
            None
        };

        tracing::info!(
            policy_id,
            decisions = decisions.len(),
            quarantined,
            "enforcement complete"
        );

        Ok(EnforcementOutcome {
            policy_id: policy.id.clone(),
            mode: policy.enforcement_mode,
            decisions,
            transformed_record,
            quarantined,
        })
    }
}

/// Evaluate the indexed candidate rules in source order
fn evaluate_candidates<'a>(
    compiled: &'a crate::policy::CompiledPolicy,
    record: &Record,
    findings: &[crate::classifier::Finding],
) -> Vec<RuleMatch<'a>> {
    let mut matches = Vec::new();
    for idx in compiled.candidate_rules(record, findings) {
        let rule = &compiled.policy.rules[idx];
        if rule.condition.evaluate(record, findings) {
            matches.push(RuleMatch {
                source_idx: idx,
                rule,
                fields: rule.condition.affected_fields(record, findings),
            });
        }
    }
    matches
}

/// Per-field conflict resolution: the highest severity wins a field, ties
/// go to the rule earliest in the policy's source order. Record-level
/// matches (no affected fields) contend in a bucket of their own.
///
/// Returns winners as match-index to won-fields, and the indices of matches
/// that lost on every field they touched.
fn resolve_conflicts(
    matches: &[RuleMatch<'_>],
) -> (BTreeMap<usize, BTreeSet<String>>, Vec<usize>) {
    // Bucket matches by affected field; "" collects record-level matches
    let mut buckets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, m) in matches.iter().enumerate() {
        if m.fields.is_empty() {
            buckets.entry("").or_default().push(i);
        } else {
            for field in &m.fields {
                buckets.entry(field.as_str()).or_default().push(i);
            }
        }
    }

    let mut winners: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for (field, contenders) in &buckets {
        let winner = contenders
            .iter()
            .copied()
            .max_by(|a, b| {
                matches[*a]
                    .rule
                    .severity
                    .cmp(&matches[*b].rule.severity)
                    .then(matches[*b].source_idx.cmp(&matches[*a].source_idx))
            })
            .unwrap_or(contenders[0]);
        let entry = winners.entry(winner).or_default();
        if !field.is_empty() {
            entry.insert((*field).to_string());
        }
    }

    let superseded: Vec<usize> = (0..matches.len()).filter(|i| !winners.contains_key(i)).collect();
    (winners, superseded)
}

/// Expand `{field}` in a rule message, or fall back to a generated one
fn expand_message(rule: &Rule, fields: &[String]) -> String {
    let joined = fields.join(", ");
    match &rule.message {
        Some(template) => template.replace("{field}", &joined),
        None if fields.is_empty() => format!("rule {} matched ({})", rule.id, rule.action),
        None => format!("rule {} matched on {} ({})", rule.id, joined, rule.action),
    }
}
