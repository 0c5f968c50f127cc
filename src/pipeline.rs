//! The resolution pipeline: one deterministic pass over the document set.
//!
//! Stage order: Collect → AutoRPC → explicit overlays (sorted) → environment
//! filter → placeholder substitution → bundle → write. Every stage except
//! Collect and Write is optional. Each overlay file is an independent pass;
//! target resolution is recomputed against the latest snapshot before a
//! file's actions apply, so later overlays see earlier effects.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::bundle::bundle_refs;
use crate::document::{collect_documents, DocumentKind, DocumentSet};
use crate::environment::filter_environment;
use crate::error::EngineError;
use crate::loader::to_yaml_string;
use crate::overlay::{apply_action, parse_overlay, Overlay};
use crate::placeholder::{load_env_file, merged_vars, substitute};
use crate::rpc::{generate_overlay, StateMachineContract};
use crate::target::resolve_targets;

/// What one resolution run should do.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Base documents: a directory or a single file. Required.
    pub spec_path: PathBuf,
    /// Overlay documents: a directory or a single file.
    pub overlay_path: Option<PathBuf>,
    /// Output directory; mirrors input relative paths.
    pub out_dir: PathBuf,
    /// Target environment for `x-environments` pruning.
    pub env: Option<String>,
    /// `KEY=VALUE` file enabling `${VAR}` substitution.
    pub env_file: Option<PathBuf>,
    /// Dereference external `$ref`s into self-contained documents.
    pub bundle: bool,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunReport {
    /// Relative paths written, in order.
    pub written: Vec<String>,
    /// Accumulated warnings, in stage order.
    pub warnings: Vec<String>,
}

/// Execute one resolution pass and write the output tree.
///
/// # Errors
///
/// Returns `EngineError` for the fatal tier only: missing input paths and
/// I/O failures. Resolution irregularities become warnings in the report.
pub fn run(options: &PipelineOptions) -> Result<RunReport, EngineError> {
    if !options.spec_path.exists() {
        return Err(EngineError::SpecPathNotFound {
            path: options.spec_path.clone(),
        });
    }
    if let Some(overlay_path) = &options.overlay_path {
        if !overlay_path.exists() {
            return Err(EngineError::OverlayPathNotFound {
                path: overlay_path.clone(),
            });
        }
    }

    let mut warnings = Vec::new();
    let (mut docs, collect_warnings) = collect_documents(&options.spec_path)?;
    warnings.extend(collect_warnings);

    apply_rpc_overlays(&mut docs, &mut warnings);
    apply_explicit_overlays(&mut docs, options.overlay_path.as_deref(), &mut warnings)?;

    if let Some(env) = &options.env {
        filter_stage(&mut docs, env, &mut warnings);
    }

    if let Some(env_file) = &options.env_file {
        let vars = merged_vars(load_env_file(env_file)?);
        let mut unresolved = BTreeSet::new();
        for doc in docs.values_mut() {
            let (next, names) = substitute(&doc.value, &vars);
            doc.value = next;
            unresolved.extend(names);
        }
        for name in unresolved {
            warnings.push(format!("unresolved placeholder `${{{}}}`", name));
        }
    }

    if options.bundle {
        bundle_stage(&mut docs, &options.spec_path, &mut warnings);
    }

    let written = write_stage(&docs, &options.out_dir)?;
    Ok(RunReport { written, warnings })
}

/// Synthesize and apply overlays from state-machine contracts in the tree.
fn apply_rpc_overlays(docs: &mut DocumentSet, warnings: &mut Vec<String>) {
    let mut contracts = Vec::new();
    for doc in docs.values() {
        if doc.kind != DocumentKind::StateMachineContract {
            continue;
        }
        // A marker match with an unusable shape is simply not a contract,
        // the same as a parse failure during discovery.
        if let Some(contract) = StateMachineContract::from_value(&doc.value) {
            contracts.push((doc.rel_path.clone(), contract));
        }
    }

    for (source, contract) in contracts {
        let (generated, generate_warnings) = generate_overlay(&contract, docs);
        for w in generate_warnings {
            warnings.push(format!("{}: {}", source, w));
        }
        if let Some(overlay) = generated {
            apply_overlay_pass(docs, &source, &overlay, warnings);
        }
    }
}

/// Apply overlays found in the spec tree, then those under `overlay_path`,
/// each group in sorted relative-path order.
fn apply_explicit_overlays(
    docs: &mut DocumentSet,
    overlay_path: Option<&Path>,
    warnings: &mut Vec<String>,
) -> Result<(), EngineError> {
    let mut passes: Vec<(String, Overlay)> = Vec::new();

    for doc in docs.values() {
        if doc.kind != DocumentKind::Overlay {
            continue;
        }
        if let Some((overlay, parse_warnings)) = parse_overlay(&doc.value) {
            for w in parse_warnings {
                warnings.push(format!("{}: {}", doc.rel_path, w));
            }
            passes.push((doc.rel_path.clone(), overlay));
        }
    }

    if let Some(root) = overlay_path {
        // Malformed files here are silently not-overlays (permissive
        // discovery); drop the collection warnings.
        let (overlay_docs, _) = collect_documents(root)?;
        for doc in overlay_docs.values() {
            if doc.kind != DocumentKind::Overlay {
                continue;
            }
            if let Some((overlay, parse_warnings)) = parse_overlay(&doc.value) {
                for w in parse_warnings {
                    warnings.push(format!("{}: {}", doc.rel_path, w));
                }
                passes.push((doc.rel_path.clone(), overlay));
            }
        }
    }

    for (source, overlay) in passes {
        apply_overlay_pass(docs, &source, &overlay, warnings);
    }
    Ok(())
}

/// Apply one overlay as an independent pass.
///
/// All actions are resolved against the snapshot at the start of the pass,
/// then applied in declaration order.
fn apply_overlay_pass(
    docs: &mut DocumentSet,
    source: &str,
    overlay: &Overlay,
    warnings: &mut Vec<String>,
) {
    let resolutions: Vec<Vec<String>> = overlay
        .actions
        .iter()
        .map(|action| {
            let (targets, resolve_warnings) = resolve_targets(action, docs);
            for w in resolve_warnings {
                warnings.push(format!("{}: {}", source, w));
            }
            targets
        })
        .collect();

    for (action, targets) in overlay.actions.iter().zip(resolutions) {
        for rel in targets {
            let Some(current) = docs.get(&rel) else {
                continue;
            };
            match apply_action(&current.value, action) {
                Ok(next) => {
                    if let Some(doc) = docs.get_mut(&rel) {
                        doc.value = next;
                    }
                }
                Err(message) => warnings.push(format!("{}: {}", source, message)),
            }
        }
    }
}

fn filter_stage(docs: &mut DocumentSet, env: &str, warnings: &mut Vec<String>) {
    let keys: Vec<String> = docs.keys().cloned().collect();
    for key in keys {
        let filtered = docs
            .get(&key)
            .and_then(|doc| filter_environment(&doc.value, env));
        match filtered {
            Some(value) => {
                if let Some(doc) = docs.get_mut(&key) {
                    doc.value = value;
                }
            }
            None => {
                docs.remove(&key);
                warnings.push(format!(
                    "document `{}` is not present in environment `{}`",
                    key, env
                ));
            }
        }
    }
}

fn bundle_stage(docs: &mut DocumentSet, spec_path: &Path, warnings: &mut Vec<String>) {
    let root_dir: PathBuf = if spec_path.is_dir() {
        spec_path.to_path_buf()
    } else {
        spec_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    for doc in docs.values_mut() {
        if doc.kind == DocumentKind::Overlay {
            continue;
        }
        let doc_dir = Path::new(&doc.rel_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| root_dir.join(p))
            .unwrap_or_else(|| root_dir.clone());

        // Bundle into a scratch copy; a failure leaves the document as-is.
        let mut candidate = doc.value.clone();
        match bundle_refs(&mut candidate, &doc_dir) {
            Ok(()) => doc.value = candidate,
            Err(message) => warnings.push(format!(
                "bundling `{}`: {} (document left unbundled)",
                doc.rel_path, message
            )),
        }
    }
}

fn write_stage(docs: &DocumentSet, out_dir: &Path) -> Result<Vec<String>, EngineError> {
    std::fs::create_dir_all(out_dir).map_err(|source| EngineError::WriteError {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for doc in docs.values() {
        // Overlay sources never reach the output tree.
        if doc.kind == DocumentKind::Overlay {
            continue;
        }
        let out_path = out_dir.join(&doc.rel_path);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EngineError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let yaml = to_yaml_string(&doc.value)?;
        std::fs::write(&out_path, yaml).map_err(|source| EngineError::WriteError {
            path: out_path.clone(),
            source,
        })?;
        written.push(doc.rel_path.clone());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options(spec: &Path, out: &Path) -> PipelineOptions {
        PipelineOptions {
            spec_path: spec.to_path_buf(),
            overlay_path: None,
            out_dir: out.to_path_buf(),
            env: None,
            env_file: None,
            bundle: false,
        }
    }

    #[test]
    fn missing_spec_path_is_fatal() {
        let out = TempDir::new().unwrap();
        let result = run(&options(Path::new("/nonexistent/specs"), out.path()));
        assert!(matches!(result, Err(EngineError::SpecPathNotFound { .. })));
    }

    #[test]
    fn missing_overlay_path_is_fatal() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(spec.path().join("a.yaml"), "info:\n  title: A\n").unwrap();

        let mut opts = options(spec.path(), out.path());
        opts.overlay_path = Some(PathBuf::from("/nonexistent/overlays"));
        let result = run(&opts);
        assert!(matches!(
            result,
            Err(EngineError::OverlayPathNotFound { .. })
        ));
    }

    #[test]
    fn no_flag_run_copies_tree_structurally() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::create_dir_all(spec.path().join("common")).unwrap();
        fs::write(spec.path().join("api.yaml"), "info:\n  title: API\n").unwrap();
        fs::write(spec.path().join("common/types.yaml"), "components: {}\n").unwrap();

        let report = run(&options(spec.path(), out.path())).unwrap();
        assert_eq!(report.written, ["api.yaml", "common/types.yaml"]);
        assert!(report.warnings.is_empty());

        let original = crate::loader::load_yaml(&spec.path().join("api.yaml")).unwrap();
        let copied = crate::loader::load_yaml(&out.path().join("api.yaml")).unwrap();
        assert_eq!(original, copied);
    }

    #[test]
    fn overlay_sources_excluded_from_output() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(spec.path().join("api.yaml"), "info:\n  title: API\n").unwrap();
        fs::write(
            spec.path().join("custom.yaml"),
            "overlay: 1.0.0\nactions: []\n",
        )
        .unwrap();

        let report = run(&options(spec.path(), out.path())).unwrap();
        assert_eq!(report.written, ["api.yaml"]);
        assert!(!out.path().join("custom.yaml").exists());
    }
}
