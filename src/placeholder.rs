//! Placeholder substitution over string leaves, plus env-file parsing.
//!
//! `${VAR}` tokens are replaced from a merged variable map in which
//! process-environment values override file-supplied values for the same
//! key. Unresolved tokens are left verbatim; their names are collected
//! (deduplicated) so the run can report them once.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::EngineError;

/// Rewrite every string leaf, replacing `${VAR}` tokens from `vars`.
///
/// Returns the new tree plus the set of variable names that had no value.
pub fn substitute(value: &Value, vars: &BTreeMap<String, String>) -> (Value, BTreeSet<String>) {
    let mut unresolved = BTreeSet::new();
    let result = substitute_value(value, vars, &mut unresolved);
    (result, unresolved)
}

fn substitute_value(
    value: &Value,
    vars: &BTreeMap<String, String>,
    unresolved: &mut BTreeSet<String>,
) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, vars, unresolved)),
        Value::Object(map) => {
            let mut result = Map::new();
            for (key, child) in map {
                result.insert(key.clone(), substitute_value(child, vars, unresolved));
            }
            Value::Object(result)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, vars, unresolved))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(
    input: &str,
    vars: &BTreeMap<String, String>,
    unresolved: &mut BTreeSet<String>,
) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.get(name) {
                    Some(value) => output.push_str(value),
                    None => {
                        // Leave the token verbatim in the output.
                        output.push_str(&rest[start..start + 2 + end + 1]);
                        if !name.is_empty() {
                            unresolved.insert(name.to_string());
                        }
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // No closing brace: not a token.
                output.push_str(&rest[start..]);
                return output;
            }
        }
    }
    output.push_str(rest);
    output
}

/// Parse a `KEY=VALUE` env file.
///
/// Blank lines and `#`-comments are ignored; single- or double-quoted
/// values are unwrapped. Lines without `=` are skipped.
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    vars
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Load and parse an env file.
///
/// # Errors
///
/// Returns `EngineError::EnvFileNotFound` if the path does not exist, or
/// `EngineError::ReadError` if it cannot be read.
pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>, EngineError> {
    if !path.exists() {
        return Err(EngineError::EnvFileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| EngineError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_env_file(&content))
}

/// Overlay process-environment values over file-supplied values.
///
/// Only keys declared in the file participate in substitution; a process
/// variable of the same name wins over the file's value.
pub fn merged_vars(file_vars: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut merged = file_vars;
    let keys: Vec<String> = merged.keys().cloned().collect();
    for key in keys {
        if let Ok(value) = std::env::var(&key) {
            merged.insert(key, value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn substitutes_string_leaves() {
        let doc = json!({
            "servers": [{ "url": "https://${HOST}/api" }],
            "info": { "title": "${NAME} API" }
        });
        let (result, unresolved) = substitute(
            &doc,
            &vars(&[("HOST", "api.example.com"), ("NAME", "Orders")]),
        );
        assert_eq!(result["servers"][0]["url"], "https://api.example.com/api");
        assert_eq!(result["info"]["title"], "Orders API");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn unresolved_tokens_left_verbatim_and_recorded_once() {
        let doc = json!({
            "a": "${MISSING}",
            "b": "also ${MISSING} here",
            "c": "${OTHER}"
        });
        let (result, unresolved) = substitute(&doc, &vars(&[]));
        assert_eq!(result["a"], "${MISSING}");
        assert_eq!(result["b"], "also ${MISSING} here");
        let names: Vec<&String> = unresolved.iter().collect();
        assert_eq!(names, ["MISSING", "OTHER"]);
    }

    #[test]
    fn multiple_tokens_in_one_string() {
        let doc = json!("${A}-${B}");
        let (result, _) = substitute(&doc, &vars(&[("A", "x"), ("B", "y")]));
        assert_eq!(result, "x-y");
    }

    #[test]
    fn unterminated_token_is_not_a_token() {
        let doc = json!("${OPEN");
        let (result, unresolved) = substitute(&doc, &vars(&[("OPEN", "nope")]));
        assert_eq!(result, "${OPEN");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn non_string_leaves_untouched() {
        let doc = json!({ "n": 42, "b": false, "nil": null });
        let (result, _) = substitute(&doc, &vars(&[]));
        assert_eq!(result, doc);
    }

    // === Env file parsing ===

    #[test]
    fn parses_key_value_lines() {
        let vars = parse_env_file("HOST=api.example.com\nPORT=8080\n");
        assert_eq!(vars.get("HOST").map(String::as_str), Some("api.example.com"));
        assert_eq!(vars.get("PORT").map(String::as_str), Some("8080"));
    }

    #[test]
    fn ignores_blanks_and_comments() {
        let vars = parse_env_file("\n# a comment\nHOST=h\n\n  # indented comment\n");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn unwraps_quoted_values() {
        let vars = parse_env_file("A=\"double quoted\"\nB='single quoted'\nC=\"mismatched'\n");
        assert_eq!(vars.get("A").map(String::as_str), Some("double quoted"));
        assert_eq!(vars.get("B").map(String::as_str), Some("single quoted"));
        assert_eq!(vars.get("C").map(String::as_str), Some("\"mismatched'"));
    }

    #[test]
    fn value_may_contain_equals() {
        let vars = parse_env_file("URL=https://example.com?a=1&b=2\n");
        assert_eq!(
            vars.get("URL").map(String::as_str),
            Some("https://example.com?a=1&b=2")
        );
    }

    #[test]
    fn skips_lines_without_equals() {
        let vars = parse_env_file("JUSTAKEY\nREAL=1\n");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn process_env_overrides_file_value() {
        // Unique name so parallel tests cannot collide.
        std::env::set_var("SPEC_OVERLAY_TEST_HOST_7431", "from-env");
        let file_vars = vars(&[("SPEC_OVERLAY_TEST_HOST_7431", "from-file")]);
        let merged = merged_vars(file_vars);
        assert_eq!(
            merged.get("SPEC_OVERLAY_TEST_HOST_7431").map(String::as_str),
            Some("from-env")
        );
        std::env::remove_var("SPEC_OVERLAY_TEST_HOST_7431");
    }

    #[test]
    fn merge_keeps_file_value_without_process_override() {
        let merged = merged_vars(vars(&[("SPEC_OVERLAY_TEST_UNSET_7431", "from-file")]));
        assert_eq!(
            merged.get("SPEC_OVERLAY_TEST_UNSET_7431").map(String::as_str),
            Some("from-file")
        );
    }
}
