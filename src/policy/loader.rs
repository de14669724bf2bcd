//! Policy document loading and validation
//!
//! One JSON document per policy, loaded as a unit from a directory. Any
//! schema violation rejects the whole document; there is no partial load.

use super::types::Policy;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Parse and validate one policy document
pub fn parse_policy(json: &str) -> Result<Policy> {
    let policy: Policy = serde_json::from_str(json)
        .map_err(|e| Error::Policy(format!("malformed policy document: {}", e)))?;
    validate_policy(&policy)?;
    Ok(policy)
}

/// Structural validation beyond the serde schema
pub fn validate_policy(policy: &Policy) -> Result<()> {
    if policy.id.trim().is_empty() {
        return Err(Error::Policy("policy id must not be empty".to_string()));
    }
    let mut seen = HashSet::new();
    for rule in &policy.rules {
        if rule.id.trim().is_empty() {
            return Err(Error::Policy(format!(
                "policy '{}' has a rule with an empty id",
                policy.id
            )));
        }
        if !seen.insert(rule.id.as_str()) {
            return Err(Error::Policy(format!(
                "policy '{}' has duplicate rule id '{}'",
                policy.id, rule.id
            )));
        }
    }
    Ok(())
}

/// Load a single policy document from a file
pub fn load_policy_file(path: &Path) -> Result<Policy> {
    let json = std::fs::read_to_string(path)?;
    parse_policy(&json)
}

/// Load all `*.json` policy documents from a directory.
///
/// Returns the policies that loaded plus the per-file failures; a rejected
/// document never prevents the others from loading.
pub fn load_dir(dir: &Path) -> (Vec<Policy>, Vec<(PathBuf, Error)>) {
    let mut policies = Vec::new();
    let mut failures = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read policy directory {}: {}", dir.display(), e);
            }
            return (policies, failures);
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    for path in paths {
        match load_policy_file(&path) {
            Ok(policy) => {
                tracing::info!("Loaded policy '{}' from {}", policy.id, path.display());
                policies.push(policy);
            }
            Err(e) => {
                tracing::warn!("Rejected policy document {}: {}", path.display(), e);
                failures.push((path, e));
            }
        }
    }

    (policies, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID_DOC: &str = r#"{
        "id": "p1",
        "name": "Privacy baseline",
        "frameworks": ["GDPR"],
        "enforcementMode": "realtime",
        "rules": [
            {
                "id": "r1",
                "condition": {"type": "finding-category", "category": "email"},
                "action": "anonymize",
                "severity": 5,
                "message": "email in {field}"
            }
        ]
    }"#;

    #[test]
    fn test_parse_valid_document() {
        let policy = parse_policy(VALID_DOC).unwrap();
        assert_eq!(policy.id, "p1");
        assert_eq!(policy.frameworks, vec!["GDPR"]);
        assert_eq!(policy.rules.len(), 1);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(parse_policy("{not json"), Err(Error::Policy(_))));
    }

    #[test]
    fn test_unknown_action_rejects_whole_document() {
        let doc = VALID_DOC.replace("anonymize", "obliterate");
        assert!(matches!(parse_policy(&doc), Err(Error::Policy(_))));
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let doc = r#"{
            "id": "p1", "name": "x", "enforcementMode": "realtime",
            "rules": [
                {"id": "r1", "condition": {"type": "field-exists", "field": "a"}, "action": "allow", "severity": 1},
                {"id": "r1", "condition": {"type": "field-exists", "field": "b"}, "action": "deny", "severity": 2}
            ]
        }"#;
        assert!(matches!(parse_policy(doc), Err(Error::Policy(_))));
    }

    #[test]
    fn test_empty_policy_id_rejected() {
        let doc = VALID_DOC.replace("\"p1\"", "\" \"");
        assert!(matches!(parse_policy(&doc), Err(Error::Policy(_))));
    }

    #[test]
    fn test_load_dir_skips_rejected_documents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("good.json"), VALID_DOC).unwrap();
        std::fs::write(dir.path().join("bad.json"), "not valid").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not a policy").unwrap();

        let (policies, failures) = load_dir(dir.path());
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].id, "p1");
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_load_missing_dir_is_empty() {
        let (policies, failures) = load_dir(Path::new("/nonexistent/flowguard-policies"));
        assert!(policies.is_empty());
        assert!(failures.is_empty());
    }
}
