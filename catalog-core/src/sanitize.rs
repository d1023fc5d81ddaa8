//! Artifact Sanitizer (§4.9): strips keys from a nested map that do not
//! carry the fixed exposure prefix, enforcing a size bound.

use serde_json::{Map, Value};

use crate::error::SanitizeError;

pub const EXPOSE_PREFIX: &str = "expose_to_cloud_redhat_com_";
pub const MAX_ARTIFACTS_BYTES: usize = 1024;

pub fn sanitize_artifacts(artifacts: &Map<String, Value>) -> Result<Map<String, Value>, SanitizeError> {
    let filtered: Map<String, Value> = artifacts
        .iter()
        .filter(|(k, _)| k.starts_with(EXPOSE_PREFIX))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let serialized = serde_json::to_vec(&filtered).map_err(|e| SanitizeError::Serialize(e.to_string()))?;
    if serialized.len() > MAX_ARTIFACTS_BYTES {
        return Err(SanitizeError::TooLarge {
            limit: MAX_ARTIFACTS_BYTES,
        });
    }

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_only_exposed_keys() {
        let mut input = Map::new();
        input.insert("expose_to_cloud_redhat_com_foo".to_string(), json!(1));
        input.insert("secret".to_string(), json!(2));

        let out = sanitize_artifacts(&input).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("expose_to_cloud_redhat_com_foo"));
    }

    #[test]
    fn rejects_oversized_output() {
        let mut input = Map::new();
        input.insert(
            "expose_to_cloud_redhat_com_blob".to_string(),
            json!("x".repeat(2000)),
        );

        let err = sanitize_artifacts(&input).unwrap_err();
        assert_eq!(
            err,
            SanitizeError::TooLarge {
                limit: MAX_ARTIFACTS_BYTES
            }
        );
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out = sanitize_artifacts(&Map::new()).unwrap();
        assert!(out.is_empty());
    }
}
