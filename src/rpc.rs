//! RPC overlay generation from state-machine transition contracts.
//!
//! A contract declares the transitions of a domain object and names the API
//! document its endpoints belong to. The generator template-copies an
//! existing single-resource endpoint of that document and synthesizes one
//! POST operation per distinct trigger, rewriting `$ref` prefixes to match
//! whatever convention the hand-authored document already follows. The
//! result is an ordinary overlay, applied through the same resolver and
//! applicator as hand-written ones.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::document::DocumentSet;
use crate::overlay::{file_scoped_update, Overlay};

/// A state-machine transition contract. Read-only input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineContract {
    #[serde(rename = "$schema", default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    pub object: String,
    /// Name of the API document the transitions belong to.
    pub api_spec: String,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub initial_state: Option<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    /// Trigger name to request-body schema name.
    #[serde(default)]
    pub request_bodies: BTreeMap<String, String>,
}

/// One transition edge of the state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct Transition {
    pub trigger: String,
    #[serde(default)]
    pub from: Value,
    #[serde(default)]
    pub to: Value,
    #[serde(default)]
    pub guards: Vec<String>,
    #[serde(default)]
    pub effects: Vec<String>,
}

impl StateMachineContract {
    /// Deserialize a contract from a classified contract document.
    ///
    /// Returns `None` if the tree does not fit the contract shape; a
    /// malformed contract is simply not a contract.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Detect the external-reference prefix convention of a document.
///
/// Scans `$ref` strings in document order for the first one containing
/// `components/` and returns everything preceding it (e.g. `#/` for
/// internal refs, `./common-v1.yaml#/` for file-relative refs).
pub fn detect_ref_prefix(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if let Some(idx) = reference.find("components/") {
                    return Some(reference[..idx].to_string());
                }
            }
            map.values().find_map(detect_ref_prefix)
        }
        Value::Array(items) => items.iter().find_map(detect_ref_prefix),
        _ => None,
    }
}

/// Rewrite every `$ref` containing `components/` to use `prefix`.
pub fn rewrite_ref_prefixes(value: &mut Value, prefix: &str) {
    match value {
        Value::Object(map) => {
            if let Some(slot) = map.get_mut("$ref") {
                if let Some(reference) = slot.as_str() {
                    if let Some(idx) = reference.find("components/") {
                        *slot = Value::String(format!("{}{}", prefix, &reference[idx..]));
                    }
                }
            }
            for child in map.values_mut() {
                rewrite_ref_prefixes(child, prefix);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_ref_prefixes(item, prefix);
            }
        }
        _ => {}
    }
}

/// Synthesize an overlay adding transition endpoints for a contract.
///
/// Returns `None` plus warnings when the target document, a usable
/// template, or any transitions are missing; generation never fails hard.
pub fn generate_overlay(
    contract: &StateMachineContract,
    docs: &DocumentSet,
) -> (Option<Overlay>, Vec<String>) {
    let mut warnings = Vec::new();

    let Some(doc) = docs.values().find(|d| {
        d.rel_path == contract.api_spec || file_name(&d.rel_path) == contract.api_spec
    }) else {
        warnings.push(format!(
            "state machine for `{}`: apiSpec `{}` not found in document set",
            contract.object, contract.api_spec
        ));
        return (None, warnings);
    };

    let Some(paths) = doc.value.get("paths").and_then(Value::as_object) else {
        warnings.push(format!(
            "state machine for `{}`: `{}` has no paths object",
            contract.object, doc.rel_path
        ));
        return (None, warnings);
    };

    // The first path item with a path parameter serves as the structural
    // template: its parameters, tag, and response schema carry over.
    let Some((template_path, template_item)) = paths.iter().find(|(key, _)| key.contains('{'))
    else {
        warnings.push(format!(
            "state machine for `{}`: no single-resource path in `{}` to use as a template",
            contract.object, doc.rel_path
        ));
        return (None, warnings);
    };

    let mut triggers: Vec<&str> = Vec::new();
    for transition in &contract.transitions {
        if !triggers.contains(&transition.trigger.as_str()) {
            triggers.push(&transition.trigger);
        }
    }
    if triggers.is_empty() {
        warnings.push(format!(
            "state machine for `{}` declares no transitions",
            contract.object
        ));
        return (None, warnings);
    }

    let prefix = detect_ref_prefix(&doc.value).unwrap_or_else(|| "#/".to_string());
    let template_op = first_operation(template_item);
    let tags = template_op.and_then(|op| op.get("tags")).cloned();
    let parameters = template_item
        .get("parameters")
        .or_else(|| template_op.and_then(|op| op.get("parameters")))
        .cloned();
    let response_ok = template_op
        .and_then(|op| op.get("responses"))
        .and_then(|responses| responses.get("200"))
        .cloned();

    let mut new_paths = Map::new();
    for trigger in triggers {
        let mut op = Map::new();
        op.insert(
            "operationId".to_string(),
            json!(format!("{}{}", trigger, contract.object)),
        );
        op.insert(
            "summary".to_string(),
            json!(format!(
                "Trigger the {} transition on {}",
                trigger, contract.object
            )),
        );
        if let Some(tags) = &tags {
            op.insert("tags".to_string(), tags.clone());
        }
        if let Some(params) = &parameters {
            let mut params = params.clone();
            rewrite_ref_prefixes(&mut params, &prefix);
            op.insert("parameters".to_string(), params);
        }
        if let Some(schema_name) = contract.request_bodies.get(trigger) {
            op.insert(
                "requestBody".to_string(),
                json!({
                    "required": true,
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": format!("{}components/schemas/{}", prefix, schema_name)
                            }
                        }
                    }
                }),
            );
        }
        let response = response_ok
            .clone()
            .map(|mut r| {
                rewrite_ref_prefixes(&mut r, &prefix);
                r
            })
            .unwrap_or_else(|| {
                json!({
                    "description": format!("{} after the {} transition", contract.object, trigger)
                })
            });
        op.insert("responses".to_string(), json!({ "200": response }));

        new_paths.insert(
            format!("{}/{}", template_path, trigger),
            json!({ "post": Value::Object(op) }),
        );
    }

    let overlay = Overlay {
        title: Some(format!("RPC transitions for {}", contract.object)),
        version: Some("1.0.0".to_string()),
        actions: vec![file_scoped_update(
            "$.paths",
            doc.rel_path.clone(),
            new_paths,
        )],
    };
    (Some(overlay), warnings)
}

fn first_operation(path_item: &Value) -> Option<&Value> {
    const METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options"];
    METHODS.iter().find_map(|m| path_item.get(*m))
}

fn file_name(rel_path: &str) -> &str {
    rel_path.rsplit('/').next().unwrap_or(rel_path)
}
