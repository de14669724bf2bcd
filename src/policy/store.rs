//! Rule store: immutable policy snapshots with atomic reload
//!
//! The store is read-mostly: every `enforce` call clones the current
//! `Arc<PolicySet>` and keeps evaluating against that snapshot even if a
//! reload lands mid-call. Reload swaps the whole set; a document that fails
//! to load leaves the previously active version of that policy in force.

use super::condition::IndexKey;
use super::loader;
use super::types::Policy;
use crate::classifier::{Category, Finding};
use crate::error::{Error, Result};
use crate::record::Record;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A policy with its rules indexed by the field or finding category their
/// condition can match, so evaluation scans candidates instead of the full
/// rule sequence.
#[derive(Debug)]
pub struct CompiledPolicy {
    pub policy: Policy,
    by_field: HashMap<String, Vec<usize>>,
    by_category: HashMap<Category, Vec<usize>>,
    /// Rules whose condition cannot be indexed (negations); scanned always
    unindexed: Vec<usize>,
}

impl CompiledPolicy {
    pub fn compile(policy: Policy) -> Self {
        let mut by_field: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_category: HashMap<Category, Vec<usize>> = HashMap::new();
        let mut unindexed = Vec::new();

        for (idx, rule) in policy.rules.iter().enumerate() {
            match rule.condition.index_keys() {
                Some(keys) => {
                    for key in keys {
                        match key {
                            IndexKey::Field(field) => {
                                by_field.entry(field).or_default().push(idx)
                            }
                            IndexKey::Category(category) => {
                                by_category.entry(category).or_default().push(idx)
                            }
                        }
                    }
                }
                None => unindexed.push(idx),
            }
        }

        Self {
            policy,
            by_field,
            by_category,
            unindexed,
        }
    }

    /// Rule indices worth evaluating for this record, in source order.
    ///
    /// The candidate set is the union of rules indexed under any resolvable
    /// field path or detected category, plus the unindexable rules. Field
    /// buckets are probed against the record so every path `Record::get`
    /// resolves nominates its rules, whether the value is a scalar, a
    /// nested object, or an array.
    pub fn candidate_rules(&self, record: &Record, findings: &[Finding]) -> Vec<usize> {
        let mut candidates: Vec<usize> = Vec::new();

        for (field, indices) in &self.by_field {
            if record.get(field).is_some() {
                candidates.extend_from_slice(indices);
            }
        }
        for finding in findings {
            if let Some(indices) = self.by_category.get(&finding.category) {
                candidates.extend_from_slice(indices);
            }
        }
        candidates.extend_from_slice(&self.unindexed);

        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }
}

/// An immutable set of compiled policies, replaced wholesale on reload
#[derive(Debug, Default)]
pub struct PolicySet {
    policies: HashMap<String, Arc<CompiledPolicy>>,
}

impl PolicySet {
    pub fn from_policies(policies: Vec<Policy>) -> Self {
        let policies = policies
            .into_iter()
            .map(|p| (p.id.clone(), Arc::new(CompiledPolicy::compile(p))))
            .collect();
        Self { policies }
    }

    /// Look up an active policy; absent or inactive both report not-found
    pub fn get_active(&self, policy_id: &str) -> Result<Arc<CompiledPolicy>> {
        match self.policies.get(policy_id) {
            Some(compiled) if compiled.policy.active => Ok(Arc::clone(compiled)),
            _ => Err(Error::PolicyNotFound(policy_id.to_string())),
        }
    }

    pub fn get(&self, policy_id: &str) -> Option<Arc<CompiledPolicy>> {
        self.policies.get(policy_id).cloned()
    }

    /// All policies, ordered by id
    pub fn all(&self) -> Vec<Arc<CompiledPolicy>> {
        let mut all: Vec<_> = self.policies.values().cloned().collect();
        all.sort_by(|a, b| a.policy.id.cmp(&b.policy.id));
        all
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Shared handle to the active policy snapshot
pub struct PolicyStore {
    inner: RwLock<Arc<PolicySet>>,
}

impl PolicyStore {
    pub fn new(set: PolicySet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(set)),
        }
    }

    pub fn empty() -> Self {
        Self::new(PolicySet::default())
    }

    /// Load all policy documents from a directory into a fresh store
    pub fn load_dir(dir: &Path) -> Self {
        let (policies, _failures) = loader::load_dir(dir);
        Self::new(PolicySet::from_policies(policies))
    }

    /// The current snapshot. Callers keep evaluating against the returned
    /// set even if a reload swaps the store underneath them.
    pub async fn snapshot(&self) -> Arc<PolicySet> {
        Arc::clone(&*self.inner.read().await)
    }

    /// Reload from a directory, swapping the snapshot atomically.
    ///
    /// A clean reload replaces the set wholesale, so a policy whose
    /// document was removed from the directory retires. When any document
    /// fails to load, it carries no readable id, so every previously
    /// active policy without a successor in this load stays in force
    /// rather than leaving a gap. Returns the number of loaded documents.
    pub async fn reload_dir(&self, dir: &Path) -> usize {
        let (policies, failures) = loader::load_dir(dir);
        let loaded = policies.len();

        let mut next: HashMap<String, Arc<CompiledPolicy>> = policies
            .into_iter()
            .map(|p| (p.id.clone(), Arc::new(CompiledPolicy::compile(p))))
            .collect();

        if !failures.is_empty() {
            let previous = self.snapshot().await;
            for (id, compiled) in &previous.policies {
                next.entry(id.clone()).or_insert_with(|| Arc::clone(compiled));
            }
            tracing::warn!(
                "Reload kept previously active policies due to {} load failure(s)",
                failures.len()
            );
        }

        *self.inner.write().await = Arc::new(PolicySet { policies: next });
        loaded
    }

    /// Replace the snapshot with an explicit set
    pub async fn replace(&self, set: PolicySet) {
        *self.inner.write().await = Arc::new(set);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::condition::Condition;
    use crate::policy::types::{Action, EnforcementMode, Rule};
    use serde_json::json;
    use tempfile::TempDir;

    fn rule(id: &str, condition: Condition, action: Action, severity: u8) -> Rule {
        Rule {
            id: id.to_string(),
            condition,
            action,
            severity,
            message: None,
        }
    }

    fn policy(id: &str, rules: Vec<Rule>) -> Policy {
        Policy {
            id: id.to_string(),
            name: id.to_string(),
            frameworks: vec!["GDPR".to_string()],
            enforcement_mode: EnforcementMode::Realtime,
            rules,
            active: true,
        }
    }

    #[test]
    fn test_candidate_rules_scans_only_relevant_buckets() {
        let compiled = CompiledPolicy::compile(policy(
            "p1",
            vec![
                rule(
                    "r-amount",
                    Condition::FieldGreaterThan {
                        field: "amount".to_string(),
                        threshold: 10.0,
                    },
                    Action::Escalate,
                    8,
                ),
                rule(
                    "r-other",
                    Condition::FieldExists {
                        field: "unrelated".to_string(),
                    },
                    Action::Flag,
                    1,
                ),
                rule(
                    "r-email",
                    Condition::FindingCategory {
                        category: Category::Email,
                    },
                    Action::Anonymize,
                    5,
                ),
            ],
        ));

        let record = Record::from_value(json!({"amount": 50})).unwrap();
        let candidates = compiled.candidate_rules(&record, &[]);
        assert_eq!(candidates, vec![0]);

        let findings = vec![Finding {
            field: "email".to_string(),
            category: Category::Email,
            confidence: 0.95,
            span: None,
        }];
        let record = Record::from_value(json!({"email": "a@b.com", "amount": 50})).unwrap();
        let candidates = compiled.candidate_rules(&record, &findings);
        assert_eq!(candidates, vec![0, 2]);
    }

    #[test]
    fn test_candidate_rules_cover_nested_non_scalar_paths() {
        let compiled = CompiledPolicy::compile(policy(
            "p1",
            vec![
                rule(
                    "r-address",
                    Condition::FieldExists {
                        field: "customer.address".to_string(),
                    },
                    Action::Flag,
                    3,
                ),
                rule(
                    "r-tags",
                    Condition::FieldExists {
                        field: "customer.tags".to_string(),
                    },
                    Action::Flag,
                    3,
                ),
            ],
        ));

        // The indexed path resolves to a nested object / an array, not a
        // scalar leaf; the rule must still be nominated
        let record = Record::from_value(json!({
            "customer": {"address": {"city": "Berlin"}, "tags": ["vip"]}
        }))
        .unwrap();
        assert_eq!(compiled.candidate_rules(&record, &[]), vec![0, 1]);

        let record = Record::from_value(json!({"customer": {"name": "Jo"}})).unwrap();
        assert!(compiled.candidate_rules(&record, &[]).is_empty());
    }

    #[test]
    fn test_unindexable_rules_always_candidates() {
        let compiled = CompiledPolicy::compile(policy(
            "p1",
            vec![rule(
                "r-absent",
                Condition::FieldAbsent {
                    field: "consent".to_string(),
                },
                Action::Deny,
                9,
            )],
        ));
        let record = Record::from_value(json!({"anything": 1})).unwrap();
        assert_eq!(compiled.candidate_rules(&record, &[]), vec![0]);
    }

    #[tokio::test]
    async fn test_inactive_policy_not_found() {
        let mut inactive = policy("p1", vec![]);
        inactive.active = false;
        let store = PolicyStore::new(PolicySet::from_policies(vec![inactive]));
        let snapshot = store.snapshot().await;
        assert!(matches!(
            snapshot.get_active("p1"),
            Err(Error::PolicyNotFound(_))
        ));
        assert!(snapshot.get("p1").is_some());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reload() {
        let store = PolicyStore::new(PolicySet::from_policies(vec![policy("p1", vec![])]));
        let before = store.snapshot().await;

        store.replace(PolicySet::default()).await;

        // In-flight readers keep the old snapshot
        assert!(before.get_active("p1").is_ok());
        let after = store.snapshot().await;
        assert!(matches!(
            after.get_active("p1"),
            Err(Error::PolicyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_keeps_previous_policy_on_failure() {
        let dir = TempDir::new().unwrap();
        let doc = serde_json::to_string(&policy("p1", vec![])).unwrap();
        std::fs::write(dir.path().join("p1.json"), &doc).unwrap();

        let store = PolicyStore::load_dir(dir.path());
        assert_eq!(store.snapshot().await.len(), 1);

        // Corrupt the document, then reload: p1 must stay in force
        std::fs::write(dir.path().join("p1.json"), "{broken").unwrap();
        let loaded = store.reload_dir(dir.path()).await;
        assert_eq!(loaded, 0);
        assert!(store.snapshot().await.get_active("p1").is_ok());
    }

    #[tokio::test]
    async fn test_clean_reload_retires_removed_policy() {
        let dir = TempDir::new().unwrap();
        let p1 = serde_json::to_string(&policy("p1", vec![])).unwrap();
        let p2 = serde_json::to_string(&policy("p2", vec![])).unwrap();
        std::fs::write(dir.path().join("p1.json"), &p1).unwrap();
        std::fs::write(dir.path().join("p2.json"), &p2).unwrap();

        let store = PolicyStore::load_dir(dir.path());
        assert_eq!(store.snapshot().await.len(), 2);

        // Removing a document retires its policy on a clean reload
        std::fs::remove_file(dir.path().join("p2.json")).unwrap();
        let loaded = store.reload_dir(dir.path()).await;
        assert_eq!(loaded, 1);
        let snapshot = store.snapshot().await;
        assert!(snapshot.get_active("p1").is_ok());
        assert!(matches!(
            snapshot.get_active("p2"),
            Err(Error::PolicyNotFound(_))
        ));
    }
}
