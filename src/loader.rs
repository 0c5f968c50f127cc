//! Document loading and serialization at the YAML boundary.
//!
//! All transformation code operates on `serde_json::Value` (with key order
//! preserved); YAML only appears here. The YAML-to-JSON conversion keeps
//! mapping keys in author order so documents round-trip stably.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::error::EngineError;

/// File extensions eligible for document collection.
const YAML_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Load a YAML document from a file path into a JSON value tree.
///
/// # Errors
///
/// Returns `EngineError::ReadError` if the file cannot be read, or
/// `EngineError::InvalidYaml` if it is not valid YAML.
pub fn load_yaml(path: &Path) -> Result<Value, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|source| EngineError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_yaml_str(&content).map_err(|e| match e {
        EngineError::InvalidYamlStr { message } => EngineError::InvalidYaml {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Load a YAML document from a string into a JSON value tree.
///
/// # Errors
///
/// Returns `EngineError::InvalidYamlStr` if the string is not valid YAML.
pub fn load_yaml_str(content: &str) -> Result<Value, EngineError> {
    let parsed: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| EngineError::InvalidYamlStr {
            message: e.to_string(),
        })?;
    yaml_to_json(&parsed).map_err(|message| EngineError::InvalidYamlStr { message })
}

/// Convert a YAML value to a JSON value, preserving mapping key order.
///
/// Non-string mapping keys are stringified deterministically; tagged values
/// are unwrapped to their inner value.
pub fn yaml_to_json(value: &serde_yaml::Value) -> Result<Value, String> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| "non-finite float in YAML".to_string())
            } else {
                Err("unrepresentable number in YAML".to_string())
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let mut out = Vec::with_capacity(seq.len());
            for item in seq {
                out.push(yaml_to_json(item)?);
            }
            Ok(Value::Array(out))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut obj = Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .map(|s| s.trim().to_string())
                        .map_err(|e| format!("unrepresentable mapping key: {}", e))?,
                };
                obj.insert(key, yaml_to_json(v)?);
            }
            Ok(Value::Object(obj))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

/// Serialize a JSON value tree back to YAML text.
///
/// # Errors
///
/// Returns `EngineError::SerializeError` if the value cannot be represented
/// as YAML.
pub fn to_yaml_string(value: &Value) -> Result<String, EngineError> {
    serde_yaml::to_string(value).map_err(|e| EngineError::SerializeError {
        message: e.to_string(),
    })
}

/// Returns true if the path has a YAML file extension.
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| YAML_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Enumerate YAML files under a root.
///
/// If `root` is a file, yields that single file with its file name as the
/// relative path. Directories are walked recursively in sorted order so the
/// result is deterministic across runs. Returns `(relative_path, full_path)`
/// pairs with `/`-separated relative paths.
pub fn collect_files(root: &Path) -> Vec<(String, PathBuf)> {
    if root.is_file() {
        let rel = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return vec![(rel, root.to_path_buf())];
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() || !is_yaml_file(path) {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, path.to_path_buf()));
    }
    files
}
