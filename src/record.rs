//! Data records submitted for enforcement
//!
//! A record is an arbitrary JSON object supplied by the caller per call.
//! The engine never persists raw records; only a non-reversible fingerprint
//! and derived decisions reach the audit trail.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Maximum nesting depth scanned for classifiable scalar fields
pub const MAX_SCAN_DEPTH: usize = 4;

/// A data record: field name to scalar or nested value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// A scalar field extracted from a record, flattened with dotted paths
#[derive(Debug, Clone)]
pub struct ScalarField {
    /// Dotted field path (e.g. `customer.email`)
    pub path: String,
    /// Text representation used for classification
    pub text: String,
}

impl Record {
    /// Validate and wrap a JSON value as a record.
    ///
    /// Rejects non-object values and empty objects with `InvalidRecord`.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) if !map.is_empty() => Ok(Self(map)),
            Value::Object(_) => Err(Error::InvalidRecord("record has no fields".to_string())),
            other => Err(Error::InvalidRecord(format!(
                "record must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Look up a field by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current: &Value = self.0.get(path.split('.').next()?)?;
        for segment in path.split('.').skip(1) {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Replace a field value by dotted path. Returns false if the path
    /// does not resolve to an existing field.
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        let mut segments = path.split('.');
        let first = match segments.next() {
            Some(s) => s,
            None => return false,
        };
        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            if self.0.contains_key(first) {
                self.0.insert(first.to_string(), value);
                return true;
            }
            return false;
        }
        let mut current = match self.0.get_mut(first) {
            Some(v) => v,
            None => return false,
        };
        for segment in &rest[..rest.len() - 1] {
            current = match current.as_object_mut().and_then(|m| m.get_mut(*segment)) {
                Some(v) => v,
                None => return false,
            };
        }
        let last = rest[rest.len() - 1];
        match current.as_object_mut() {
            Some(map) if map.contains_key(last) => {
                map.insert(last.to_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Flatten the record into classifiable scalar fields.
    ///
    /// Nested objects flatten into dotted paths. Arrays and objects nested
    /// deeper than [`MAX_SCAN_DEPTH`] cannot be classified; their paths are
    /// returned separately so the classifier can isolate them as per-field
    /// errors without failing the rest of the record.
    pub fn scalar_fields(&self) -> (Vec<ScalarField>, Vec<String>) {
        let mut scalars = Vec::new();
        let mut errored = Vec::new();
        for (key, value) in &self.0 {
            flatten_into(key, value, 1, &mut scalars, &mut errored);
        }
        (scalars, errored)
    }

    /// Non-reversible fingerprint of the record contents.
    ///
    /// SHA-256 over a canonical serialization (object keys sorted), hex
    /// encoded. Equal records always produce equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut canonical = String::new();
        canonical_write(&Value::Object(self.0.clone()), &mut canonical);
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Borrow the underlying field map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn flatten_into(
    path: &str,
    value: &Value,
    depth: usize,
    scalars: &mut Vec<ScalarField>,
    errored: &mut Vec<String>,
) {
    match value {
        Value::String(s) => scalars.push(ScalarField {
            path: path.to_string(),
            text: s.clone(),
        }),
        Value::Number(n) => scalars.push(ScalarField {
            path: path.to_string(),
            text: n.to_string(),
        }),
        Value::Bool(b) => scalars.push(ScalarField {
            path: path.to_string(),
            text: b.to_string(),
        }),
        Value::Null => {}
        Value::Array(_) => errored.push(path.to_string()),
        Value::Object(map) => {
            if depth >= MAX_SCAN_DEPTH {
                errored.push(path.to_string());
                return;
            }
            for (key, nested) in map {
                flatten_into(&format!("{}.{}", path, key), nested, depth + 1, scalars, errored);
            }
        }
    }
}

/// Serialize a value with object keys sorted, so fingerprints are
/// independent of caller field order.
fn canonical_write(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                canonical_write(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_write(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            Record::from_value(json!("just a string")),
            Err(Error::InvalidRecord(_))
        ));
        assert!(matches!(
            Record::from_value(json!([1, 2, 3])),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_rejects_empty_object() {
        assert!(matches!(
            Record::from_value(json!({})),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_get_dotted_path() {
        let rec = record(json!({"customer": {"email": "a@b.com"}, "amount": 42}));
        assert_eq!(rec.get("customer.email"), Some(&json!("a@b.com")));
        assert_eq!(rec.get("amount"), Some(&json!(42)));
        assert!(rec.get("customer.phone").is_none());
        assert!(rec.get("missing").is_none());
    }

    #[test]
    fn test_set_dotted_path() {
        let mut rec = record(json!({"customer": {"email": "a@b.com"}}));
        assert!(rec.set("customer.email", json!("[REDACTED]")));
        assert_eq!(rec.get("customer.email"), Some(&json!("[REDACTED]")));
        assert!(!rec.set("customer.missing", json!(1)));
        assert!(!rec.set("missing", json!(1)));
    }

    #[test]
    fn test_scalar_fields_flatten() {
        let rec = record(json!({
            "email": "a@b.com",
            "amount": 15000,
            "customer": {"name": "Jo"},
            "tags": ["x"],
            "note": null
        }));
        let (scalars, errored) = rec.scalar_fields();
        let paths: Vec<&str> = scalars.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"email"));
        assert!(paths.contains(&"amount"));
        assert!(paths.contains(&"customer.name"));
        assert_eq!(errored, vec!["tags".to_string()]);
    }

    #[test]
    fn test_scalar_fields_depth_limit() {
        let rec = record(json!({"a": {"b": {"c": {"d": {"e": "deep"}}}}}));
        let (scalars, errored) = rec.scalar_fields();
        assert!(scalars.is_empty());
        assert_eq!(errored, vec!["a.b.c.d".to_string()]);
    }

    #[test]
    fn test_fingerprint_field_order_independent() {
        let a = record(json!({"x": 1, "y": "two"}));
        let b = record(json!({"y": "two", "x": 1}));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_differs_on_content() {
        let a = record(json!({"x": 1}));
        let b = record(json!({"x": 2}));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
