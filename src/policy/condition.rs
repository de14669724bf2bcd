//! Rule condition trees
//!
//! Conditions are parsed once at policy load into a tagged-variant tree and
//! evaluated per call against the record and the classifier's findings.

use crate::classifier::{Category, Finding};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A predicate over record fields and classifier findings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Condition {
    /// Field present with exactly this value (numbers compared numerically)
    FieldEquals { field: String, value: Value },
    FieldExists { field: String },
    FieldAbsent { field: String },
    /// Numeric field strictly greater than the threshold
    FieldGreaterThan { field: String, threshold: f64 },
    /// Numeric field strictly less than the threshold
    FieldLessThan { field: String, threshold: f64 },
    /// Any finding of this category exists in the record
    FindingCategory { category: Category },
    AllOf { conditions: Vec<Condition> },
    AnyOf { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

/// Key under which a rule can be indexed for candidate scanning
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Field(String),
    Category(Category),
}

impl Condition {
    /// Evaluate against a record and its findings.
    ///
    /// A reference to a missing field is a non-match, never an error.
    /// `classification-error` findings satisfy no category condition.
    pub fn evaluate(&self, record: &Record, findings: &[Finding]) -> bool {
        match self {
            Self::FieldEquals { field, value } => match record.get(field) {
                Some(actual) => values_equal(actual, value),
                None => false,
            },
            Self::FieldExists { field } => record.get(field).is_some(),
            Self::FieldAbsent { field } => record.get(field).is_none(),
            Self::FieldGreaterThan { field, threshold } => record
                .get(field)
                .and_then(Value::as_f64)
                .map(|v| v > *threshold)
                .unwrap_or(false),
            Self::FieldLessThan { field, threshold } => record
                .get(field)
                .and_then(Value::as_f64)
                .map(|v| v < *threshold)
                .unwrap_or(false),
            Self::FindingCategory { category } => {
                *category != Category::ClassificationError
                    && findings.iter().any(|f| f.category == *category)
            }
            Self::AllOf { conditions } => conditions.iter().all(|c| c.evaluate(record, findings)),
            Self::AnyOf { conditions } => conditions.iter().any(|c| c.evaluate(record, findings)),
            Self::Not { condition } => !condition.evaluate(record, findings),
        }
    }

    /// The record fields a matched condition touches, used to bucket
    /// decisions for conflict resolution. Negative conditions touch no
    /// concrete field; such matches apply at record level.
    pub fn affected_fields(&self, record: &Record, findings: &[Finding]) -> Vec<String> {
        let mut fields = Vec::new();
        self.collect_affected(record, findings, &mut fields);
        fields.dedup();
        fields
    }

    fn collect_affected(&self, record: &Record, findings: &[Finding], out: &mut Vec<String>) {
        match self {
            Self::FieldEquals { field, .. }
            | Self::FieldExists { field }
            | Self::FieldGreaterThan { field, .. }
            | Self::FieldLessThan { field, .. } => {
                if record.get(field).is_some() && !out.contains(field) {
                    out.push(field.clone());
                }
            }
            Self::FieldAbsent { .. } | Self::Not { .. } => {}
            Self::FindingCategory { category } => {
                for finding in findings.iter().filter(|f| f.category == *category) {
                    if !out.contains(&finding.field) {
                        out.push(finding.field.clone());
                    }
                }
            }
            Self::AllOf { conditions } => {
                for condition in conditions {
                    condition.collect_affected(record, findings, out);
                }
            }
            Self::AnyOf { conditions } => {
                for condition in conditions {
                    if condition.evaluate(record, findings) {
                        condition.collect_affected(record, findings, out);
                    }
                }
            }
        }
    }

    /// Index keys under which this condition can be found, or `None` when
    /// the condition cannot be indexed (negations) and the owning rule must
    /// be scanned on every call.
    ///
    /// For `all-of` one indexable child suffices: the rule can only match
    /// when that child matches. For `any-of` every child must be indexable
    /// or the whole rule is unindexable.
    pub fn index_keys(&self) -> Option<Vec<IndexKey>> {
        match self {
            Self::FieldEquals { field, .. }
            | Self::FieldExists { field }
            | Self::FieldGreaterThan { field, .. }
            | Self::FieldLessThan { field, .. } => {
                Some(vec![IndexKey::Field(field.clone())])
            }
            Self::FieldAbsent { .. } | Self::Not { .. } => None,
            Self::FindingCategory { category } => {
                Some(vec![IndexKey::Category(category.clone())])
            }
            Self::AllOf { conditions } => {
                conditions.iter().find_map(|c| c.index_keys())
            }
            Self::AnyOf { conditions } => {
                let mut keys = Vec::new();
                for condition in conditions {
                    keys.extend(condition.index_keys()?);
                }
                if keys.is_empty() {
                    None
                } else {
                    Some(keys)
                }
            }
        }
    }
}

/// Equality with numeric coercion, so `15000` equals `15000.0`
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
