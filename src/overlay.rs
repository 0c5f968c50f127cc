//! Overlay model and the action applicator.
//!
//! An overlay is an ordered sequence of declarative mutations plus
//! descriptive metadata. Parsing is lenient: an action missing its target
//! or mutation directive is skipped with a warning rather than failing the
//! whole overlay. Application is copy-on-write: the input document is never
//! touched.

use serde_json::{Map, Value};

use crate::target::TargetPath;

/// One overlay: descriptive metadata plus its ordered actions.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub title: Option<String>,
    pub version: Option<String>,
    pub actions: Vec<Action>,
}

/// A single declarative mutation.
#[derive(Debug, Clone)]
pub struct Action {
    /// Restricted property-path expression locating the mutation site.
    pub target: String,
    /// The mutation directive (exactly one per action).
    pub mutation: Mutation,
    /// Explicit relative paths this action applies to. Takes precedence
    /// over the metadata filters below.
    pub files: Vec<String>,
    /// Match on `info.x-api-id`.
    pub target_api: Option<String>,
    /// Match on the filename-derived version number.
    pub target_version: Option<u32>,
}

/// The mutation half of an action.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Merge a mapping into the object at the target (shallow: colliding
    /// keys are replaced, siblings preserved).
    Update(Value),
    /// Delete the key named by the final path segment.
    Remove,
    /// Move the value at the target to a sibling key, deleting the old key.
    Rename(String),
}

/// Parse an overlay out of a classified overlay document.
///
/// Returns `None` when the tree does not carry the `overlay` marker.
/// Otherwise returns the overlay plus warnings for any actions that could
/// not be parsed (those actions are skipped).
pub fn parse_overlay(value: &Value) -> Option<(Overlay, Vec<String>)> {
    value.get("overlay").and_then(Value::as_str)?;

    let mut warnings = Vec::new();
    let info = value.get("info");
    let title = info
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .map(String::from);
    let version = info
        .and_then(|i| i.get("version"))
        .and_then(Value::as_str)
        .map(String::from);

    let mut actions = Vec::new();
    let declared = value.get("actions").and_then(Value::as_array);
    if let Some(list) = declared {
        for (index, entry) in list.iter().enumerate() {
            match parse_action(entry) {
                Ok(action) => actions.push(action),
                Err(message) => warnings.push(format!("action {}: {}", index, message)),
            }
        }
    }

    Some((
        Overlay {
            title,
            version,
            actions,
        },
        warnings,
    ))
}

fn parse_action(entry: &Value) -> Result<Action, String> {
    let obj = entry.as_object().ok_or("action is not a mapping")?;

    let target = obj
        .get("target")
        .and_then(Value::as_str)
        .ok_or("missing target")?
        .to_string();

    let mut mutations = Vec::new();
    if let Some(update) = obj.get("update") {
        mutations.push(Mutation::Update(update.clone()));
    }
    // `remove: false` is an explicit no-op, not a directive.
    if obj.get("remove").and_then(Value::as_bool) == Some(true) {
        mutations.push(Mutation::Remove);
    }
    if let Some(new_key) = obj.get("rename") {
        let new_key = new_key
            .as_str()
            .ok_or("rename value must be a string key")?;
        mutations.push(Mutation::Rename(new_key.to_string()));
    }

    let mutation = match mutations.len() {
        0 => return Err("missing mutation directive (update, remove, or rename)".into()),
        1 => mutations.remove(0),
        _ => return Err("exactly one of update, remove, rename is allowed".into()),
    };

    let mut files = Vec::new();
    if let Some(file) = obj.get("file").and_then(Value::as_str) {
        files.push(file.to_string());
    }
    if let Some(list) = obj.get("files").and_then(Value::as_array) {
        for entry in list {
            match entry.as_str() {
                Some(file) if !files.iter().any(|f| f == file) => files.push(file.to_string()),
                Some(_) => {}
                None => return Err("files entries must be strings".into()),
            }
        }
    }

    let target_api = obj
        .get("target-api")
        .and_then(Value::as_str)
        .map(String::from);
    let target_version = match obj.get("target-version") {
        None => None,
        Some(v) => Some(
            v.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or("target-version must be a number")?,
        ),
    };

    Ok(Action {
        target,
        mutation,
        files,
        target_api,
        target_version,
    })
}

/// Apply one action to one document, producing a new tree.
///
/// The input is never mutated. A failed application (missing target,
/// non-mapping parent) is reported as an `Err` warning message, never a
/// panic; the caller records it and moves on.
pub fn apply_action(doc: &Value, action: &Action) -> Result<Value, String> {
    let path = TargetPath::parse(&action.target)?;
    let mut next = doc.clone();

    match &action.mutation {
        Mutation::Update(content) => {
            let slot = path
                .lookup_mut(&mut next)
                .ok_or_else(|| format!("update target `{}` does not exist", action.target))?;
            match (slot.as_object_mut(), content.as_object()) {
                (Some(existing), Some(incoming)) => {
                    // Shallow merge: one level deep, colliding keys replaced.
                    for (key, value) in incoming {
                        existing.insert(key.clone(), value.clone());
                    }
                }
                // Merge is only defined between mappings; otherwise the
                // value at the target is replaced wholesale.
                _ => *slot = content.clone(),
            }
        }
        Mutation::Remove => {
            let removed = path
                .parent_object_mut(&mut next)
                .and_then(|parent| parent.remove(path.last()));
            if removed.is_none() {
                return Err(format!("remove target `{}` does not exist", action.target));
            }
        }
        Mutation::Rename(new_key) => {
            let parent = path
                .parent_object_mut(&mut next)
                .ok_or_else(|| format!("rename target `{}` does not exist", action.target))?;
            let value = parent
                .remove(path.last())
                .ok_or_else(|| format!("rename target `{}` does not exist", action.target))?;
            parent.insert(new_key.clone(), value);
        }
    }

    Ok(next)
}

/// Convenience for synthesized overlays: an action with only an explicit
/// file disambiguator.
pub fn file_scoped_update(target: impl Into<String>, file: impl Into<String>, content: Map<String, Value>) -> Action {
    Action {
        target: target.into(),
        mutation: Mutation::Update(Value::Object(content)),
        files: vec![file.into()],
        target_api: None,
        target_version: None,
    }
}
