//! Dereferencing external `$ref`s into self-contained documents.
//!
//! Walks a document tree, loads files referenced by `$ref` (with an
//! optional `#/fragment`), and inlines their content. Internal refs of the
//! root document are left in place; internal refs inside loaded files are
//! resolved against that file. Self-root refs (`$ref: "#"`) stay as-is,
//! recursive types cannot be inlined. Failures are reported as messages so
//! the orchestrator can isolate them per document.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use crate::loader::load_yaml;

/// Navigate a JSON-Pointer-style fragment (e.g. `#/components/schemas/Pet`).
///
/// # Errors
///
/// Returns a message when the fragment names a missing key.
pub fn navigate_fragment(doc: &Value, fragment: &str) -> Result<Value, String> {
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(doc.clone());
    }

    let mut current = doc;
    for part in path.split('/') {
        // JSON Pointer escaping: ~1 is /, ~0 is ~.
        let key = part.replace("~1", "/").replace("~0", "~");
        current = current
            .get(&key)
            .ok_or_else(|| format!("fragment not found: {}", fragment))?;
    }
    Ok(current.clone())
}

/// Recursively inline external `$ref`s, resolving paths against `base_dir`.
///
/// # Errors
///
/// Returns a message on circular reference chains, unreadable referenced
/// files, or missing fragments. The document may be partially rewritten
/// when an error surfaces; callers keep their own pristine copy.
pub fn bundle_refs(doc: &mut Value, base_dir: &Path) -> Result<(), String> {
    bundle_refs_inner(doc, base_dir, None, &mut HashSet::new())
}

fn bundle_refs_inner(
    node: &mut Value,
    base_dir: &Path,
    file_root: Option<(&str, &Value)>,
    visited: &mut HashSet<String>,
) -> Result<(), String> {
    match node {
        Value::Object(obj) => {
            if let Some(ref_val) = obj.get("$ref").and_then(Value::as_str).map(String::from) {
                if ref_val.starts_with('#') {
                    // Internal ref. In the root document it stays for the
                    // consumer; inside a loaded file it resolves against
                    // that file. `#` alone is a recursive self-ref.
                    if ref_val != "#" {
                        if let Some((file_key, root)) = file_root {
                            // Fragment chains within one file can cycle too.
                            let visit_key = format!("{}|{}", file_key, ref_val);
                            if visited.contains(&visit_key) {
                                return Err(format!(
                                    "circular reference detected: {}",
                                    ref_val
                                ));
                            }
                            let mut target = navigate_fragment(root, &ref_val)?;
                            visited.insert(visit_key.clone());
                            bundle_refs_inner(&mut target, base_dir, file_root, visited)?;
                            visited.remove(&visit_key);
                            obj.remove("$ref");
                            if let Value::Object(target_obj) = target {
                                for (k, v) in target_obj {
                                    obj.entry(k).or_insert(v);
                                }
                            }
                            return Ok(());
                        }
                    }
                } else {
                    let (file_part, fragment) = match ref_val.find('#') {
                        Some(idx) => (&ref_val[..idx], Some(&ref_val[idx..])),
                        None => (ref_val.as_str(), None),
                    };

                    let ref_path = base_dir.join(file_part);
                    let canonical = ref_path.canonicalize().unwrap_or_else(|_| ref_path.clone());
                    let file_key = canonical.display().to_string();
                    let visit_key = format!("{}|{}", file_key, fragment.unwrap_or(""));
                    if visited.contains(&visit_key) {
                        return Err(format!("circular reference detected: {}", ref_val));
                    }

                    let loaded = load_yaml(&ref_path).map_err(|e| e.to_string())?;
                    let mut target = match fragment {
                        Some(frag) => navigate_fragment(&loaded, frag)?,
                        None => loaded.clone(),
                    };

                    visited.insert(visit_key.clone());
                    let ref_dir = ref_path.parent().unwrap_or(base_dir);
                    // The loaded file becomes the root for its internal refs.
                    bundle_refs_inner(&mut target, ref_dir, Some((file_key.as_str(), &loaded)), visited)?;
                    visited.remove(&visit_key);

                    obj.remove("$ref");
                    if let Value::Object(target_obj) = target {
                        for (k, v) in target_obj {
                            obj.entry(k).or_insert(v);
                        }
                    }
                    return Ok(());
                }
            }

            for child in obj.values_mut() {
                bundle_refs_inner(child, base_dir, file_root, visited)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                bundle_refs_inner(item, base_dir, file_root, visited)?;
            }
        }
        _ => {}
    }
    Ok(())
}
