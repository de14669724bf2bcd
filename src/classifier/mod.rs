//! Content classifier for detecting sensitive data in records
//!
//! Pure, rule-based classification: each scalar field is scanned by an
//! ordered set of category matchers (email, phone, national id, payment
//! card, plus custom patterns from configuration). Matching is deterministic
//! and side-effect free; confidence is fixed per matcher, not learned.

mod matchers;

pub use matchers::{luhn_check, validate_payment_card, validate_ssn};

use crate::error::{Error, Result};
use crate::record::Record;
use matchers::{builtin_matchers, Matcher};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sensitive-content category of a finding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Email,
    Phone,
    NationalId,
    PaymentCard,
    /// A field the classifier could not scan (unsupported value shape);
    /// treated as non-matching by category-based rules
    ClassificationError,
    /// User-defined pattern, identified by rule name
    Custom(String),
}

impl Category {
    /// Wire name for the category
    pub fn name(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::NationalId => "national-id",
            Self::PaymentCard => "payment-card",
            Self::ClassificationError => "classification-error",
            Self::Custom(name) => name,
        }
    }

    /// Parse a wire name; unrecognized names become custom categories
    pub fn from_name(name: &str) -> Self {
        match name {
            "email" => Self::Email,
            "phone" => Self::Phone,
            "national-id" => Self::NationalId,
            "payment-card" => Self::PaymentCard,
            "classification-error" => Self::ClassificationError,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// A single sensitive-content match in a record field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Dotted field path the match was found in
    pub field: String,
    /// Detected category
    pub category: Category,
    /// Fixed per-matcher confidence, 0.0 to 1.0
    pub confidence: f64,
    /// Matched byte span within the field's text, for redaction
    pub span: Option<(usize, usize)>,
}

/// A user-defined classification rule loaded from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Rule name, doubles as the custom category name
    pub name: String,
    /// Regex pattern applied to scalar field text
    pub pattern: String,
    /// Confidence reported for matches of this rule
    #[serde(default = "default_rule_confidence")]
    pub confidence: f64,
}

fn default_rule_confidence() -> f64 {
    0.80
}

/// Rule-based content classifier
pub struct Classifier {
    matchers: Vec<Matcher>,
}

impl Classifier {
    /// Create a classifier with the built-in matchers only
    pub fn new() -> Self {
        Self {
            matchers: builtin_matchers(),
        }
    }

    /// Create a classifier with built-in matchers plus custom rules.
    ///
    /// An invalid custom pattern rejects construction; there is no partial
    /// classifier.
    pub fn with_custom_rules(rules: &[ClassificationRule]) -> Result<Self> {
        let mut matchers = builtin_matchers();
        for rule in rules {
            let pattern = Regex::new(&rule.pattern).map_err(|e| {
                Error::Classifier(format!("invalid pattern for rule '{}': {}", rule.name, e))
            })?;
            matchers.push(Matcher {
                category: Category::Custom(rule.name.clone()),
                pattern,
                confidence: rule.confidence,
                validate: None,
            });
        }
        Ok(Self { matchers })
    }

    /// Classify every scalar field of a record.
    ///
    /// A field may yield zero or more findings; a value matching several
    /// categories reports all of them, highest confidence first per field.
    /// Fields the record cannot expose as text (arrays, over-deep nesting)
    /// yield a single `classification-error` finding and never fail the
    /// call.
    pub fn classify(&self, record: &Record) -> Vec<Finding> {
        let (scalars, errored) = record.scalar_fields();
        let mut findings = Vec::new();

        for field in &scalars {
            let mut field_findings = self.classify_text(&field.path, &field.text);
            field_findings.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.span.cmp(&b.span))
            });
            findings.extend(field_findings);
        }

        for path in errored {
            findings.push(Finding {
                field: path,
                category: Category::ClassificationError,
                confidence: 1.0,
                span: None,
            });
        }

        findings
    }

    /// Run all matchers over a single field's text
    fn classify_text(&self, field: &str, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for matcher in &self.matchers {
            for mat in matcher.pattern.find_iter(text) {
                if let Some(validate) = matcher.validate {
                    if !validate(mat.as_str()) {
                        continue;
                    }
                }
                findings.push(Finding {
                    field: field.to_string(),
                    category: matcher.category.clone(),
                    confidence: matcher.confidence,
                    span: Some((mat.start(), mat.end())),
                });
            }
        }
        findings
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
