//! CLI integration tests for the spec-overlay binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("spec-overlay"))
}

// Helper to create a file inside a temp tree
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

mod argument_handling {
    use super::*;

    #[test]
    fn help_lists_flags() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--spec-path"))
            .stdout(predicate::str::contains("--overlay-path"))
            .stdout(predicate::str::contains("--bundle"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("spec-overlay"));
    }

    #[test]
    fn out_is_required() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "a.yaml", "info: {}\n");

        cmd()
            .args(["--spec-path", dir.path().to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--out"));
    }

    #[test]
    fn one_spec_input_is_required() {
        cmd()
            .args(["--out", "out"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--spec-path"));
    }

    #[test]
    fn spec_path_and_spec_file_conflict() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(&dir, "a.yaml", "info: {}\n");

        cmd()
            .args([
                "--spec-path",
                dir.path().to_str().unwrap(),
                "--spec-file",
                file.to_str().unwrap(),
                "--out",
                "out",
            ])
            .assert()
            .failure();
    }
}

mod fatal_errors {
    use super::*;

    #[test]
    fn missing_spec_path_exits_3() {
        let out = TempDir::new().unwrap();
        cmd()
            .args([
                "--spec-path",
                "/nonexistent/specs",
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .failure()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn missing_overlay_path_exits_3() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(&spec, "a.yaml", "info: {}\n");

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--overlay-path",
                "/nonexistent/overlays",
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .failure()
            .code(3);
    }

    #[test]
    fn missing_env_file_exits_3() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(&spec, "a.yaml", "info: {}\n");

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--env-file",
                "/nonexistent/vars.env",
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .failure()
            .code(3);
    }
}

mod resolution_runs {
    use super::*;

    #[test]
    fn plain_copy_reports_written_count() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(&spec, "a.yaml", "info:\n  title: A\n");
        write_temp_file(&spec, "b.yaml", "info:\n  title: B\n");

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("wrote 2 document(s)"));

        assert!(out.path().join("a.yaml").exists());
        assert!(out.path().join("b.yaml").exists());
    }

    #[test]
    fn spec_file_accepts_a_single_document() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let file = write_temp_file(&spec, "solo.yaml", "info:\n  title: Solo\n");

        cmd()
            .args([
                "--spec-file",
                file.to_str().unwrap(),
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("wrote 1 document(s)"));

        assert!(out.path().join("solo.yaml").exists());
    }

    #[test]
    fn unresolved_target_warns_on_stderr_but_succeeds() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(&spec, "api.yaml", "info:\n  title: API\n");
        write_temp_file(
            &spec,
            "custom.yaml",
            "overlay: 1.0.0\nactions:\n  - target: $.components.schemas.Ghost\n    remove: true\n",
        );

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("warning:"))
            .stderr(predicate::str::contains("does not exist in any document"));
    }

    #[test]
    fn overlay_file_flag_applies_one_overlay() {
        let spec = TempDir::new().unwrap();
        let overlays = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(&spec, "api.yaml", "info:\n  title: Original\n");
        let overlay = write_temp_file(
            &overlays,
            "rename.yaml",
            "overlay: 1.0.0\nactions:\n  - target: $.info.title\n    update: Patched\n",
        );

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--overlay-file",
                overlay.to_str().unwrap(),
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success();

        let written = fs::read_to_string(out.path().join("api.yaml")).unwrap();
        assert!(written.contains("Patched"));
    }

    #[test]
    fn env_flag_prunes_tagged_subtrees() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(
            &spec,
            "api.yaml",
            "paths:\n  /debug:\n    x-environments:\n      - dev\n    get: {}\n  /pets:\n    get: {}\n",
        );

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--env",
                "prod",
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success();

        let written = fs::read_to_string(out.path().join("api.yaml")).unwrap();
        assert!(written.contains("/pets"));
        assert!(!written.contains("/debug"));
    }
}

mod placeholder_runs {
    use super::*;

    #[test]
    fn process_env_overrides_env_file() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(
            &spec,
            "api.yaml",
            "servers:\n  - url: https://${SPEC_OVERLAY_CLI_HOST}/api\n",
        );
        let env_file = write_temp_file(&spec, "vars.env", "SPEC_OVERLAY_CLI_HOST=from-file\n");

        cmd()
            .env("SPEC_OVERLAY_CLI_HOST", "from-env")
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--env-file",
                env_file.to_str().unwrap(),
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success();

        let written = fs::read_to_string(out.path().join("api.yaml")).unwrap();
        assert!(written.contains("https://from-env/api"));
        assert!(!written.contains("from-file"));
    }

    #[test]
    fn unresolved_placeholder_warns_and_keeps_token() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(&spec, "api.yaml", "host: ${SPEC_OVERLAY_CLI_ABSENT}\n");
        let env_file = write_temp_file(&spec, "vars.env", "OTHER=1\n");

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--env-file",
                env_file.to_str().unwrap(),
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("SPEC_OVERLAY_CLI_ABSENT"));

        let written = fs::read_to_string(out.path().join("api.yaml")).unwrap();
        assert!(written.contains("${SPEC_OVERLAY_CLI_ABSENT}"));
    }
}

mod bundle_runs {
    use super::*;

    #[test]
    fn bundle_flag_inlines_external_refs() {
        let spec = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_temp_file(
            &spec,
            "common.yaml",
            "components:\n  schemas:\n    Pet:\n      type: object\n",
        );
        write_temp_file(
            &spec,
            "api.yaml",
            "schema:\n  $ref: 'common.yaml#/components/schemas/Pet'\n",
        );

        cmd()
            .args([
                "--spec-path",
                spec.path().to_str().unwrap(),
                "--bundle",
                "--out",
                out.path().to_str().unwrap(),
            ])
            .assert()
            .success();

        let written = fs::read_to_string(out.path().join("api.yaml")).unwrap();
        assert!(!written.contains("$ref"));
        assert!(written.contains("type: object"));
    }
}
