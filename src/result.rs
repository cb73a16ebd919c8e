//! The per-check outcome record.

use serde::Serialize;
use std::fmt;

/// Maximum length of `details` text derived from tool output or errors.
pub const MAX_DETAIL_CHARS: usize = 200;

/// The fourteen checks, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CheckKind {
    Checksum,
    SigstoreSignature,
    CertificateIdentity,
    RekorTransparencyLog,
    GithubAttestation,
    SbomAttestation,
    Sbom,
    OsvScan,
    SlsaProvenance,
    BuildEnvironment,
    ReproducibleBuild,
    ArtifactMetadata,
    LicenseCompliance,
    DependencyPinning,
}

impl CheckKind {
    pub const ALL: [Self; 14] = [
        Self::Checksum,
        Self::SigstoreSignature,
        Self::CertificateIdentity,
        Self::RekorTransparencyLog,
        Self::GithubAttestation,
        Self::SbomAttestation,
        Self::Sbom,
        Self::OsvScan,
        Self::SlsaProvenance,
        Self::BuildEnvironment,
        Self::ReproducibleBuild,
        Self::ArtifactMetadata,
        Self::LicenseCompliance,
        Self::DependencyPinning,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Checksum => "Checksum",
            Self::SigstoreSignature => "Sigstore Signature",
            Self::CertificateIdentity => "Certificate Identity",
            Self::RekorTransparencyLog => "Rekor Transparency Log",
            Self::GithubAttestation => "GitHub Attestation",
            Self::SbomAttestation => "SBOM Attestation",
            Self::Sbom => "SBOM",
            Self::OsvScan => "OSV Scan",
            Self::SlsaProvenance => "SLSA Provenance",
            Self::BuildEnvironment => "Build Environment",
            Self::ReproducibleBuild => "Reproducible Build",
            Self::ArtifactMetadata => "Artifact Metadata",
            Self::LicenseCompliance => "License Compliance",
            Self::DependencyPinning => "Dependency Pinning",
        }
    }

    pub fn pass(self, message: impl Into<String>) -> CheckResult {
        CheckResult::new(self, true, message.into(), None)
    }

    pub fn fail(self, message: impl Into<String>) -> CheckResult {
        CheckResult::new(self, false, message.into(), None)
    }

    /// Converts an internal error into a failing result with truncated text.
    pub fn error(self, message: impl Into<String>, err: &anyhow::Error) -> CheckResult {
        self.fail(message).with_details(truncate_detail(&format!("{err:#}")))
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one check. Built once by the check unit and never mutated by
/// the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    #[serde(skip)]
    kind: CheckKind,
    name: &'static str,
    passed: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl CheckResult {
    fn new(kind: CheckKind, passed: bool, message: String, details: Option<String>) -> Self {
        Self {
            kind,
            name: kind.name(),
            passed,
            message,
            details,
        }
    }

    /// Builder-style details, consumed at construction time.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn kind(&self) -> CheckKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

/// Cuts `s` to [`MAX_DETAIL_CHARS`] characters on a char boundary.
pub fn truncate_detail(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX_DETAIL_CHARS).collect()
}
