//! Sigstore keyless signature checks.
//!
//! The signature itself is verified by `cosign verify-blob`; only the
//! transparency-log metadata is read directly from the bundle.

use std::path::{Path, PathBuf};

use crate::evidence::sigbundle::first_tlog_entry;
use crate::fs_guard::read_json;
use crate::locate::{describe, first_existing};
use crate::result::{CheckKind, CheckResult};
use crate::tools::{Tool, ToolCommand};

use super::{tool_failure, CheckContext};

fn signature_bundle(ctx: &CheckContext<'_>, kind: CheckKind) -> Result<PathBuf, CheckResult> {
    let candidates = ctx.evidence.signature_bundle_candidates();
    first_existing(&candidates).cloned().ok_or_else(|| {
        kind.fail("No signature bundle found")
            .with_details(format!("Expected at: {}", describe(&candidates)))
    })
}

fn verify_blob(ctx: &CheckContext<'_>, bundle: &Path) -> ToolCommand {
    ToolCommand::tool(Tool::Cosign, ctx.config.timeouts.signing())
        .arg("verify-blob")
        .arg(ctx.binary())
        .arg("--bundle")
        .arg(bundle)
}

/// Any valid keyless signature recorded in Rekor.
pub fn signature(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::SigstoreSignature;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let bundle = match signature_bundle(ctx, kind) {
        Ok(b) => b,
        Err(r) => return r,
    };

    let cmd = verify_blob(ctx, &bundle)
        .args(["--certificate-identity-regexp", ".*"])
        .args(["--certificate-oidc-issuer-regexp", ".*"]);
    match ctx.runner.run(&cmd) {
        Ok(out) if out.success() => kind
            .pass("Signature verified via Rekor transparency log")
            .with_details("Keyless signing with certificate from Fulcio CA"),
        Ok(out) => {
            let r = kind.fail("Signature verification failed");
            match out.stderr_detail() {
                Some(d) => r.with_details(d),
                None => r,
            }
        }
        Err(e) => tool_failure(kind, Tool::Cosign, &e),
    }
}

/// The signing certificate was issued to this repository's CI workflow.
pub fn certificate_identity(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::CertificateIdentity;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let bundle = match signature_bundle(ctx, kind) {
        Ok(b) => b,
        Err(r) => return r,
    };

    let identity = format!(".*{}.*", regex::escape(ctx.repository));
    let cmd = verify_blob(ctx, &bundle)
        .arg("--certificate-identity-regexp")
        .arg(&identity)
        .arg("--certificate-oidc-issuer")
        .arg(&ctx.config.oidc_issuer);
    match ctx.runner.run(&cmd) {
        Ok(out) if out.success() => kind.pass("Certificate identity verified").with_details(format!(
            "OIDC issuer: {} | Repo: {}",
            ctx.config.oidc_issuer, ctx.repository
        )),
        Ok(out) => kind
            .fail("Certificate identity verification failed")
            .with_details(out.stderr_detail().unwrap_or_else(|| {
                format!("Certificate may not match repository {}", ctx.repository)
            })),
        Err(e) => tool_failure(kind, Tool::Cosign, &e),
    }
}

/// The bundle records a Rekor entry; reports where and when.
pub fn rekor_transparency_log(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::RekorTransparencyLog;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let bundle = match signature_bundle(ctx, kind) {
        Ok(b) => b,
        Err(r) => return r,
    };

    let doc = match read_json(&bundle) {
        Ok(v) => v,
        Err(e) => return kind.error("Invalid Sigstore bundle format", &e),
    };

    let Some(entry) = first_tlog_entry(&doc) else {
        return kind.fail("No transparency log entries found in bundle");
    };

    let missing = entry.missing_fields();
    if !missing.is_empty() {
        return kind
            .fail("Transparency log entry incomplete")
            .with_details(format!("Missing: {}", missing.join(", ")));
    }

    let index = entry
        .log_index
        .map_or_else(|| "unknown".to_string(), |i| i.to_string());
    kind.pass("Rekor transparency log entry verified")
        .with_details(format!(
            "Index: {index} | Time: {} | Key: {}",
            entry.timestamp(),
            entry.key_hint()
        ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::fixture::{Release, REPO};
    use super::*;
    use crate::tools::fake::{FakeRunner, Scripted};
    use serde_json::json;

    fn signed_release() -> Release {
        let rel = Release::new(b"signed");
        rel.write(
            "demo.bin.sigstore.json",
            json!({
                "verificationMaterial": {
                    "tlogEntries": [{
                        "logIndex": "98765",
                        "logId": {"keyId": "wNI9atQGlz+VWfO6LRygH4QUfY/8W4RFwiT5i5WRgB0="},
                        "integratedTime": "1700000000"
                    }]
                }
            })
            .to_string(),
        );
        rel
    }

    #[test]
    fn test_signature_without_bundle() {
        let rel = Release::new(b"unsigned");
        let runner = FakeRunner::new();
        let r = signature(&rel.ctx(&runner, "0.1.0"));
        assert!(!r.passed());
        assert_eq!(r.message(), "No signature bundle found");
        assert!(r.details().unwrap().contains("demo.bin.sigstore"));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_signature_verified_by_cosign() {
        let rel = signed_release();
        let runner = FakeRunner::new().exit("cosign", "verify-blob", 0, "Verified OK");
        let r = signature(&rel.ctx(&runner, "0.1.0"));
        assert!(r.passed(), "{}", r.message());
        let call = runner.calls.borrow()[0].clone();
        assert!(call.contains("--certificate-identity-regexp .*"));
        assert!(call.contains("--certificate-oidc-issuer-regexp .*"));
    }

    #[test]
    fn test_signature_rejected_by_cosign() {
        let rel = signed_release();
        let runner = FakeRunner::new().on(
            "cosign",
            "verify-blob",
            Scripted::Exit(1, String::new(), "error: invalid signature".to_string()),
        );
        let r = signature(&rel.ctx(&runner, "0.1.0"));
        assert!(!r.passed());
        assert_eq!(r.message(), "Signature verification failed");
        assert_eq!(r.details(), Some("error: invalid signature"));
    }

    #[test]
    fn test_cosign_missing_is_distinct_from_failure() {
        let rel = signed_release();
        let runner = FakeRunner::new();
        let r = signature(&rel.ctx(&runner, "0.1.0"));
        assert_eq!(r.message(), "cosign not installed");
        assert!(r.details().unwrap().contains("Install"));
    }

    #[test]
    fn test_cosign_timeout() {
        let rel = signed_release();
        let runner = FakeRunner::new().on("cosign", "verify-blob", Scripted::Timeout);
        let r = certificate_identity(&rel.ctx(&runner, "0.1.0"));
        assert!(!r.passed());
        assert_eq!(r.message(), "Verification timeout");
    }

    #[test]
    fn test_certificate_identity_pins_repo_and_issuer() {
        let rel = signed_release();
        let runner = FakeRunner::new().exit("cosign", "verify-blob", 0, "");
        let r = certificate_identity(&rel.ctx(&runner, "0.1.0"));
        assert!(r.passed());
        let call = runner.calls.borrow()[0].clone();
        assert!(call.contains(&format!("--certificate-identity-regexp .*{REPO}.*")));
        assert!(call.contains("--certificate-oidc-issuer https://token.actions.githubusercontent.com"));
    }

    #[test]
    fn test_rekor_entry_details() {
        let rel = signed_release();
        let runner = FakeRunner::new();
        let r = rekor_transparency_log(&rel.ctx(&runner, "0.1.0"));
        assert!(r.passed(), "{}", r.message());
        let d = r.details().unwrap();
        assert!(d.contains("Index: 98765"));
        assert!(d.contains("2023-11-14 22:13:20 UTC"));
        assert!(d.contains("Key: wNI9atQGlz+VWfO6..."));
    }

    #[test]
    fn test_rekor_malformed_bundle() {
        let rel = Release::new(b"signed");
        rel.write("demo.bin.sigstore", "{not json");
        let runner = FakeRunner::new();
        let r = rekor_transparency_log(&rel.ctx(&runner, "0.1.0"));
        assert!(!r.passed());
        assert_eq!(r.message(), "Invalid Sigstore bundle format");
        assert!(r.details().is_some());
    }

    #[test]
    fn test_rekor_bundle_without_entries() {
        let rel = Release::new(b"signed");
        rel.write("demo.bin.sigstore", r#"{"base64Signature": "MEUC"}"#);
        let runner = FakeRunner::new();
        let r = rekor_transparency_log(&rel.ctx(&runner, "0.1.0"));
        assert_eq!(r.message(), "No transparency log entries found in bundle");
    }
}
