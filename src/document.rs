//! Document model and classification.
//!
//! Every file loaded from the spec tree is classified exactly once into a
//! closed set of kinds; downstream stages switch on the kind instead of
//! re-probing the tree for marker fields.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::EngineError;
use crate::loader::{collect_files, load_yaml};

/// Top-level marker field that identifies an overlay document.
pub const OVERLAY_MARKER: &str = "overlay";

/// Top-level field that identifies a state-machine contract.
pub const CONTRACT_SCHEMA_KEY: &str = "$schema";

/// Kind of a loaded document, decided once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Carries the `overlay` version marker; holds actions, never written out.
    Overlay,
    /// A state-machine transition contract; input to RPC overlay generation.
    StateMachineContract,
    /// Any other YAML tree; subject to overlays, filtering, and substitution.
    Plain,
}

/// A loaded document: parsed tree plus identity metadata.
///
/// Immutable by convention: pipeline stages replace `value` with a new tree
/// rather than mutating shared state.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the collection root, `/`-separated.
    pub rel_path: String,
    /// The parsed tree.
    pub value: Value,
    /// Classification performed at load time.
    pub kind: DocumentKind,
    /// `info.x-api-id`, when present.
    pub api_id: Option<String>,
    /// Version derived from the filename (`-vN` suffix, default 1).
    pub version: u32,
}

impl Document {
    /// Build a document from its relative path and parsed tree.
    pub fn new(rel_path: impl Into<String>, value: Value) -> Self {
        let rel_path = rel_path.into();
        let kind = classify(&value);
        let api_id = api_id(&value);
        let version = filename_version(&rel_path);
        Document {
            rel_path,
            value,
            kind,
            api_id,
            version,
        }
    }
}

/// The in-memory forest, keyed by relative path for deterministic iteration.
pub type DocumentSet = BTreeMap<String, Document>;

/// Classify a parsed tree into its document kind.
pub fn classify(value: &Value) -> DocumentKind {
    if value.get(OVERLAY_MARKER).and_then(Value::as_str).is_some() {
        return DocumentKind::Overlay;
    }
    if let Some(schema) = value.get(CONTRACT_SCHEMA_KEY).and_then(Value::as_str) {
        let lowered = schema.to_ascii_lowercase();
        if lowered.contains("statemachine") || lowered.contains("state-machine") {
            return DocumentKind::StateMachineContract;
        }
    }
    DocumentKind::Plain
}

/// Extract `info.x-api-id` from a document tree.
pub fn api_id(value: &Value) -> Option<String> {
    value
        .get("info")
        .and_then(|info| info.get("x-api-id"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Derive a version number from a filename.
///
/// `foo.yaml` is version 1; `foo-v3.yaml` is version 3. Anything after a
/// `-v` that is not all digits does not count as a version suffix.
pub fn filename_version(rel_path: &str) -> u32 {
    let stem = Path::new(rel_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(rel_path);

    if let Some(idx) = stem.rfind("-v") {
        let suffix = &stem[idx + 2..];
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(version) = suffix.parse() {
                return version;
            }
        }
    }
    1
}

/// Load every YAML document under `root` into a document set.
///
/// Files that fail to parse are skipped with a warning; discovery stays
/// permissive across a shared tree. Returns the set plus collection warnings.
///
/// # Errors
///
/// Returns `EngineError::ReadError` only for files that exist but cannot be
/// read; existence of `root` itself is the caller's precondition.
pub fn collect_documents(root: &Path) -> Result<(DocumentSet, Vec<String>), EngineError> {
    let mut docs = DocumentSet::new();
    let mut warnings = Vec::new();

    for (rel, full) in collect_files(root) {
        match load_yaml(&full) {
            Ok(value) => {
                docs.insert(rel.clone(), Document::new(rel, value));
            }
            Err(EngineError::InvalidYaml { path, message }) => {
                warnings.push(format!(
                    "skipping unparseable document {}: {}",
                    path.display(),
                    message
                ));
            }
            Err(other) => return Err(other),
        }
    }

    Ok((docs, warnings))
}
