//! Integration tests for the provcheck binary.
//!
//! These tests invoke the compiled `provcheck` binary end to end against
//! release directories built in temp dirs. `PATH` is emptied so that no
//! locally installed cosign/gh/osv-scanner can influence the outcome.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn provcheck_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_provcheck"))
}

/// A `provcheck` command with a scrubbed tool environment.
fn provcheck() -> Command {
    let mut cmd = Command::new(provcheck_bin());
    cmd.env("PATH", "").env_remove("GITHUB_REPOSITORY");
    cmd
}

fn write_release(dir: &Path, content: &[u8]) -> PathBuf {
    let bin = dir.join("demo.bin");
    fs::write(&bin, content).unwrap();
    bin
}

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).into_owned()
}

fn stderr(o: &Output) -> String {
    String::from_utf8_lossy(&o.stderr).into_owned()
}

// -------------------------------------------------------------------------
// verify
// -------------------------------------------------------------------------

#[test]
fn test_verify_without_evidence_fails_all_fourteen() {
    let dir = TempDir::new().unwrap();
    let bin = write_release(dir.path(), b"bare-binary");

    let output = provcheck()
        .args(["verify", "--file", bin.to_str().unwrap(), "--repo", "acme/widget"])
        .output()
        .expect("failed to execute provcheck");

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Verifying demo.bin"));
    assert!(out.contains("Repository: acme/widget"));
    assert_eq!(out.lines().filter(|l| l.starts_with("✗ ")).count(), 15);
    assert!(out.contains("0/14 checks passed"));
    assert!(out.contains("gh not installed"));
    assert!(out.contains("development build"));
}

#[test]
fn test_verify_json_report() {
    let dir = TempDir::new().unwrap();
    let bin = write_release(dir.path(), b"json-binary");

    let output = provcheck()
        .args(["verify", "--json", "--file", bin.to_str().unwrap(), "--repo", "acme/widget"])
        .output()
        .expect("failed to execute provcheck");

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", stdout(&output)));
    assert_eq!(report["report_schema"], "provcheck/report/v1");
    assert_eq!(report["repository"], "acme/widget");
    assert_eq!(report["total"], 14);
    assert_eq!(report["passed"], 0);
    assert_eq!(report["all_passed"], false);
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 14);
    assert_eq!(results[0]["name"], "Checksum");
    assert_eq!(results[13]["name"], "Dependency Pinning");
    assert!(report["provcheck_version"].as_str().is_some());
}

#[test]
fn test_verify_checksum_passes_and_report_written() {
    let dir = TempDir::new().unwrap();
    let content = b"release-binary";
    let bin = write_release(dir.path(), content);
    let digest = hex::encode(Sha256::digest(content));
    fs::write(dir.path().join("checksums.txt"), format!("{digest}  demo.bin\n")).unwrap();
    let report_path = dir.path().join("out").join("report.json");
    fs::create_dir_all(report_path.parent().unwrap()).unwrap();

    let output = provcheck()
        .args([
            "verify",
            "--file",
            bin.to_str().unwrap(),
            "--report",
            report_path.to_str().unwrap(),
        ])
        .output()
        .expect("failed to execute provcheck");

    let out = stdout(&output);
    assert!(out.contains("✓ Checksum: SHA256 checksum matches release manifest"), "{out}");
    assert!(out.contains(&digest[..8]));
    assert!(out.contains("1/14 checks passed"));
    assert!(out.contains("Repository: OWNER/REPO"));

    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(&report_path).unwrap()).unwrap();
    assert_eq!(report["passed"], 1);
    assert_eq!(report["results"][0]["passed"], true);
}

#[test]
fn test_verify_offline_evidence_checks() {
    let dir = TempDir::new().unwrap();
    let content = b"offline-binary";
    let bin = write_release(dir.path(), content);
    let digest = hex::encode(Sha256::digest(content));

    fs::write(
        dir.path().join("attestation.jsonl"),
        serde_json::json!({
            "_type": "https://in-toto.io/Statement/v1",
            "subject": [{"name": "demo.bin", "digest": {"sha256": digest}}],
            "predicateType": "https://slsa.dev/provenance/v1",
            "predicate": {
                "buildDefinition": {"buildType": "https://actions.github.io/buildtypes/workflow/v1"},
                "runDetails": {"builder": {"id": "https://github.com/actions/runner/github-hosted"}}
            }
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.path().join("build-metadata.json"),
        r#"{"SOURCE_DATE_EPOCH": "1700000000"}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("sbom.cyclonedx.json"),
        r#"{"bomFormat": "CycloneDX", "components": [
            {"name": "serde", "version": "1.0.200", "licenses": [{"license": {"id": "MIT"}}]}
        ]}"#,
    )
    .unwrap();
    fs::write(dir.path().join("osv-scan-results.json"), r#"{"results": []}"#).unwrap();

    let output = provcheck()
        .args(["verify", "--json", "--file", bin.to_str().unwrap()])
        .output()
        .expect("failed to execute provcheck");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let passed: Vec<&str> = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["passed"] == true)
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        passed,
        vec![
            "SBOM",
            "OSV Scan",
            "SLSA Provenance",
            "Build Environment",
            "Reproducible Build",
            "License Compliance",
            "Dependency Pinning",
        ]
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_verify_missing_explicit_binary_reports_per_check() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("not-built.bin");

    let output = provcheck()
        .args(["verify", "--file", missing.to_str().unwrap()])
        .output()
        .expect("failed to execute provcheck");

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("✗ Checksum: Binary not found"));
    assert!(out.contains("0/14 checks passed"));
}

#[test]
fn test_verify_unresolvable_binary_is_fatal() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("cfg.json");
    fs::write(&cfg, r#"{"artifact_name": "no-such-artifact"}"#).unwrap();

    let output = provcheck()
        .args(["verify", "--config", cfg.to_str().unwrap()])
        .output()
        .expect("failed to execute provcheck");

    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("binary not found"), "{}", stderr(&output));
}

#[test]
fn test_repository_from_environment_and_explicit_config() {
    let dir = TempDir::new().unwrap();
    let bin = write_release(dir.path(), b"bin");

    let output = provcheck()
        .env("GITHUB_REPOSITORY", "env/repo")
        .args(["verify", "--file", bin.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(stdout(&output).contains("Repository: env/repo"));

    let cfg = dir.path().join("settings.json");
    fs::write(&cfg, r#"{"repository": "file/repo"}"#).unwrap();
    let output = provcheck()
        .env("GITHUB_REPOSITORY", "")
        .args(["verify", "--file", bin.to_str().unwrap(), "--config", cfg.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(stdout(&output).contains("Repository: file/repo"), "{}", stdout(&output));
}

#[test]
fn test_sibling_config_cannot_choose_repository() {
    let dir = TempDir::new().unwrap();
    let bin = write_release(dir.path(), b"bin");
    fs::write(dir.path().join("provcheck.json"), r#"{"repository": "attacker/repo"}"#).unwrap();

    let output = provcheck()
        .args(["verify", "--file", bin.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(stdout(&output).contains("Repository: OWNER/REPO"), "{}", stdout(&output));
}

#[test]
fn test_malformed_sibling_config_is_ignored() {
    let dir = TempDir::new().unwrap();
    let bin = write_release(dir.path(), b"bin");
    fs::write(dir.path().join("provcheck.json"), "{broken").unwrap();

    let output = provcheck()
        .args(["verify", "--file", bin.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("0/14 checks passed"), "{}", stdout(&output));
    assert!(stderr(&output).contains("ignoring unusable config"), "{}", stderr(&output));
}

#[test]
fn test_malformed_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let bin = write_release(dir.path(), b"bin");
    let cfg = dir.path().join("bad.json");
    fs::write(&cfg, "{not json").unwrap();

    let output = provcheck()
        .args(["verify", "--file", bin.to_str().unwrap(), "--config", cfg.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("parse config"));
}

// -------------------------------------------------------------------------
// tools / version
// -------------------------------------------------------------------------

#[test]
fn test_tools_lists_missing_with_hints() {
    let output = provcheck().arg("tools").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    for tool in ["cosign", "gh", "osv-scanner"] {
        assert!(err.contains(&format!("✗ {tool}: not found")), "{err}");
    }
}

#[test]
fn test_version_flag() {
    let output = provcheck().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("provcheck {}", env!("CARGO_PKG_VERSION"))
    );
}
