//! Environment-based pruning of tagged subtrees.
//!
//! Any map node or sequence element carrying an `x-environments` list
//! survives only if the target environment is a member. The tag is stripped
//! from survivors, which is what makes a second pass with the same
//! environment a no-op.

use serde_json::{Map, Value};

/// Node tag restricting presence to named deployment environments.
pub const ENV_TAG: &str = "x-environments";

/// Prune subtrees tagged for other environments.
///
/// Returns `None` when the node itself is tagged for an environment other
/// than `env` (the caller drops it); otherwise a new tree with the tag
/// stripped from every surviving node. Scalar leaves pass through unchanged.
pub fn filter_environment(value: &Value, env: &str) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if let Some(tags) = map.get(ENV_TAG) {
                if !env_listed(tags, env) {
                    return None;
                }
            }
            let mut result = Map::new();
            for (key, child) in map {
                if key == ENV_TAG {
                    continue;
                }
                if let Some(kept) = filter_environment(child, env) {
                    result.insert(key.clone(), kept);
                }
            }
            Some(Value::Object(result))
        }
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| filter_environment(item, env))
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

/// Membership check for the tag value.
///
/// A list is checked for membership, a bare string for equality. Any other
/// shape is treated as absent so a malformed tag never silently deletes a
/// subtree.
fn env_listed(tags: &Value, env: &str) -> bool {
    match tags {
        Value::Array(list) => list.iter().any(|t| t.as_str() == Some(env)),
        Value::String(s) => s == env,
        _ => true,
    }
}
