//! Spec Overlay Resolver
//!
//! Resolves layered declarative document transformations ("overlays")
//! against a forest of YAML specification documents, producing a
//! self-consistent, environment-specific output tree. One shared
//! specification set is customized per deployment without forking files.
//!
//! The pipeline: collect documents, synthesize RPC overlays from
//! state-machine contracts, apply explicit overlays in sorted order, prune
//! environment-tagged subtrees, substitute `${VAR}` placeholders,
//! optionally bundle `$ref`s, and write the result. Every irregularity
//! short of a missing input path degrades to a warning; an action whose
//! target is ambiguous across documents is never applied.
//!
//! # Example
//!
//! ```
//! use spec_overlay::{apply_action, Action, Mutation};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "components": { "schemas": { "Pizza": {
//!         "properties": { "name": { "type": "string" } }
//!     } } }
//! });
//!
//! let action = Action {
//!     target: "$.components.schemas.Pizza.properties".into(),
//!     mutation: Mutation::Update(json!({ "toppings": { "type": "array" } })),
//!     files: Vec::new(),
//!     target_api: None,
//!     target_version: None,
//! };
//!
//! let resolved = apply_action(&doc, &action).unwrap();
//! assert!(resolved["components"]["schemas"]["Pizza"]["properties"]
//!     .get("toppings")
//!     .is_some());
//! // The input document is untouched.
//! assert!(doc["components"]["schemas"]["Pizza"]["properties"]
//!     .get("toppings")
//!     .is_none());
//! ```

mod bundle;
mod document;
mod environment;
mod error;
mod loader;
mod overlay;
mod pipeline;
mod placeholder;
mod rpc;
mod target;

pub use bundle::{bundle_refs, navigate_fragment};
pub use document::{
    api_id, classify, collect_documents, filename_version, Document, DocumentKind, DocumentSet,
    CONTRACT_SCHEMA_KEY, OVERLAY_MARKER,
};
pub use environment::{filter_environment, ENV_TAG};
pub use error::EngineError;
pub use loader::{collect_files, load_yaml, load_yaml_str, to_yaml_string, yaml_to_json};
pub use overlay::{apply_action, file_scoped_update, parse_overlay, Action, Mutation, Overlay};
pub use pipeline::{run, PipelineOptions, RunReport};
pub use placeholder::{load_env_file, merged_vars, parse_env_file, substitute};
pub use rpc::{
    detect_ref_prefix, generate_overlay, rewrite_ref_prefixes, StateMachineContract, Transition,
};
pub use target::{resolve_targets, TargetPath};
