//! Target location and per-action document resolution.
//!
//! Target expressions are a deliberately restricted subset of JSONPath:
//! property traversal only, written with dots or brackets, no wildcards and
//! no predicates. The resolver decides which document(s) an action legally
//! applies to; ambiguity never auto-applies to an arbitrary file.

use serde_json::{Map, Value};

use crate::document::DocumentSet;
use crate::overlay::Action;

/// A parsed target expression: an ordered chain of property names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    segments: Vec<String>,
}

impl TargetPath {
    /// Parse a dot-or-bracket property path.
    ///
    /// Accepts an optional leading `$`, `.key` segments, and `['key']` /
    /// `["key"]` / `[key]` bracket segments. Bracket keys may contain any
    /// character (path keys like `/tasks/{taskId}` need them).
    ///
    /// # Errors
    ///
    /// Returns a warning message for empty expressions, empty segments,
    /// unterminated brackets or quotes, and wildcard segments.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let chars: Vec<char> = expr.chars().collect();
        let mut i = 0;

        // Optional root marker.
        if chars.first() == Some(&'$') {
            i += 1;
        }

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let key: String = chars[start..i].iter().collect();
                    if key.is_empty() {
                        return Err(format!("empty segment in target `{}`", expr));
                    }
                    if key == "*" {
                        return Err(format!("wildcards are not supported in target `{}`", expr));
                    }
                    segments.push(key);
                }
                '[' => {
                    i += 1;
                    let quote = match chars.get(i) {
                        Some(&q @ ('\'' | '"')) => {
                            i += 1;
                            Some(q)
                        }
                        _ => None,
                    };
                    let start = i;
                    let end_char = quote.unwrap_or(']');
                    while i < chars.len() && chars[i] != end_char {
                        i += 1;
                    }
                    if i >= chars.len() {
                        return Err(format!("unterminated bracket in target `{}`", expr));
                    }
                    let key: String = chars[start..i].iter().collect();
                    i += 1; // closing quote or bracket
                    if quote.is_some() {
                        if chars.get(i) != Some(&']') {
                            return Err(format!("unterminated bracket in target `{}`", expr));
                        }
                        i += 1;
                    }
                    if key.is_empty() {
                        return Err(format!("empty segment in target `{}`", expr));
                    }
                    if key == "*" {
                        return Err(format!("wildcards are not supported in target `{}`", expr));
                    }
                    segments.push(key);
                }
                _ if segments.is_empty() && i == usize::from(chars.first() == Some(&'$')) => {
                    // Bare leading key without a dot, e.g. `info.title`.
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let key: String = chars[start..i].iter().collect();
                    if key == "*" {
                        return Err(format!("wildcards are not supported in target `{}`", expr));
                    }
                    segments.push(key);
                }
                c => {
                    return Err(format!("unexpected `{}` in target `{}`", c, expr));
                }
            }
        }

        if segments.is_empty() {
            return Err(format!("target `{}` names no property", expr));
        }
        Ok(TargetPath { segments })
    }

    /// The chain of property names, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment (the key an action ultimately touches).
    pub fn last(&self) -> &str {
        // Parse guarantees at least one segment.
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Returns true iff every segment resolves to a defined value.
    pub fn exists(&self, doc: &Value) -> bool {
        self.lookup(doc).is_some()
    }

    /// Navigate to the value at this path, if the full chain exists.
    pub fn lookup<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let mut current = doc;
        for segment in &self.segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Navigate to the value at this path, mutably.
    pub fn lookup_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = doc;
        for segment in &self.segments {
            current = current.get_mut(segment)?;
        }
        Some(current)
    }

    /// Navigate to the map containing the final segment, mutably.
    ///
    /// Returns `None` if any intermediate segment is missing or the parent
    /// is not a mapping. The final segment itself need not exist.
    pub fn parent_object_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Map<String, Value>> {
        let mut current = doc;
        for segment in &self.segments[..self.segments.len() - 1] {
            current = current.get_mut(segment)?;
        }
        current.as_object_mut()
    }
}

/// Decide which documents an action applies to.
///
/// Returns the matched relative paths plus any warnings. Explicit
/// `file`/`files` lists permit partial application: named files whose tree
/// lacks the target are warned about and skipped while the rest still
/// apply. The automatic path is conservative: zero or multiple candidates
/// produce a warning and an empty list.
pub fn resolve_targets(action: &Action, docs: &DocumentSet) -> (Vec<String>, Vec<String>) {
    let mut warnings = Vec::new();

    let path = match TargetPath::parse(&action.target) {
        Ok(path) => path,
        Err(message) => {
            warnings.push(message);
            return (Vec::new(), warnings);
        }
    };

    let matches: Vec<String> = docs
        .values()
        .filter(|doc| path.exists(&doc.value))
        .map(|doc| doc.rel_path.clone())
        .collect();

    // Explicit file list: partial success is permitted.
    if !action.files.is_empty() {
        let mut selected = Vec::new();
        for file in &action.files {
            if !docs.contains_key(file) {
                warnings.push(format!(
                    "target `{}`: file `{}` is not in the document set",
                    action.target, file
                ));
            } else if matches.iter().any(|m| m == file) {
                selected.push(file.clone());
            } else {
                warnings.push(format!(
                    "target `{}` does not exist in `{}`",
                    action.target, file
                ));
            }
        }
        return (selected, warnings);
    }

    let mut filtered = matches.clone();
    if let Some(api) = &action.target_api {
        filtered.retain(|rel| {
            docs.get(rel)
                .map(|doc| doc.api_id.as_deref() == Some(api.as_str()))
                .unwrap_or(false)
        });
    }
    if let Some(version) = action.target_version {
        filtered.retain(|rel| {
            docs.get(rel)
                .map(|doc| doc.version == version)
                .unwrap_or(false)
        });
    }

    match filtered.len() {
        0 => {
            if matches.is_empty() {
                warnings.push(format!(
                    "target `{}` does not exist in any document",
                    action.target
                ));
            } else {
                warnings.push(format!(
                    "target `{}` matched {} file(s) but none passed the target-api/target-version filters",
                    action.target,
                    matches.len()
                ));
            }
            (Vec::new(), warnings)
        }
        1 => (filtered, warnings),
        _ => {
            warnings.push(format!(
                "target `{}` is ambiguous across [{}]; disambiguate with file, target-api, or target-version",
                action.target,
                filtered.join(", ")
            ));
            (Vec::new(), warnings)
        }
    }
}
