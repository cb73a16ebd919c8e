//! The fourteen check units.
//!
//! Every unit is a plain function from a shared, read-only [`CheckContext`]
//! to exactly one [`CheckResult`]. Units never return errors and never
//! depend on each other; the aggregator in [`crate::session`] simply walks
//! [`BATTERY`] in order.
//!
//! | File | Checks |
//! |------|--------|
//! | [`integrity`] | Checksum |
//! | [`sigstore`] | Sigstore Signature, Certificate Identity, Rekor Transparency Log |
//! | [`github`] | GitHub Attestation, SBOM Attestation, Artifact Metadata |
//! | [`sbom`] | SBOM, OSV Scan, License Compliance, Dependency Pinning |
//! | [`provenance`] | SLSA Provenance, Build Environment, Reproducible Build |

use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::config::VerifyConfig;
use crate::digest::{sha256_file, MAX_BINARY_BYTES};
use crate::locate::EvidenceLocator;
use crate::result::{CheckKind, CheckResult};
use crate::tools::{Tool, ToolError, ToolRunner};

pub mod github;
pub mod integrity;
pub mod provenance;
pub mod sbom;
pub mod sigstore;

/// Read-only inputs shared by every check unit in a session.
pub struct CheckContext<'a> {
    pub evidence: EvidenceLocator,
    pub repository: &'a str,
    pub version: &'a str,
    pub config: &'a VerifyConfig,
    pub runner: &'a dyn ToolRunner,
}

impl CheckContext<'_> {
    pub fn binary(&self) -> &Path {
        self.evidence.binary()
    }

    pub fn binary_sha256(&self) -> Result<String> {
        sha256_file(self.binary(), MAX_BINARY_BYTES)
    }

    /// Failing result for units that need the binary on disk, or `None`
    /// when it is there.
    fn missing_binary(&self, kind: CheckKind) -> Option<CheckResult> {
        if self.binary().is_file() {
            return None;
        }
        Some(
            kind.fail("Binary not found")
                .with_details(format!("Could not locate binary at {}", self.binary().display())),
        )
    }
}

pub type CheckFn = fn(&CheckContext<'_>) -> CheckResult;

/// The battery, in report order.
pub const BATTERY: [(CheckKind, CheckFn); 14] = [
    (CheckKind::Checksum, integrity::checksum),
    (CheckKind::SigstoreSignature, sigstore::signature),
    (CheckKind::CertificateIdentity, sigstore::certificate_identity),
    (CheckKind::RekorTransparencyLog, sigstore::rekor_transparency_log),
    (CheckKind::GithubAttestation, github::attestation),
    (CheckKind::SbomAttestation, github::sbom_attestation),
    (CheckKind::Sbom, sbom::sbom),
    (CheckKind::OsvScan, sbom::osv_scan),
    (CheckKind::SlsaProvenance, provenance::slsa_provenance),
    (CheckKind::BuildEnvironment, provenance::build_environment),
    (CheckKind::ReproducibleBuild, provenance::reproducible_build),
    (CheckKind::ArtifactMetadata, github::artifact_metadata),
    (CheckKind::LicenseCompliance, sbom::license_compliance),
    (CheckKind::DependencyPinning, sbom::dependency_pinning),
];

/// Runs one unit and logs its outcome.
pub fn run_check(kind: CheckKind, check: CheckFn, ctx: &CheckContext<'_>) -> CheckResult {
    debug!(check = kind.name(), "running check");
    let result = check(ctx);
    debug!(check = kind.name(), passed = result.passed(), message = result.message(), "check finished");
    result
}

/// Maps a tool that could not give an answer to a failing result. Keeps
/// "not installed", "timed out" and "could not launch" apart since each
/// needs a different fix.
fn tool_failure(kind: CheckKind, tool: Tool, err: &ToolError) -> CheckResult {
    match err {
        ToolError::NotInstalled { .. } => kind
            .fail(format!("{} not installed", tool.program()))
            .with_details(tool.install_hint()),
        ToolError::Timeout { timeout, .. } => kind.fail("Verification timeout").with_details(format!(
            "{} did not finish within {}s",
            tool.program(),
            timeout.as_secs()
        )),
        ToolError::Launch { .. } => kind
            .fail("Verification error")
            .with_details(crate::result::truncate_detail(&err.to_string())),
    }
}
