use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Maximum config file size (1 MB).
const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

/// Environment variable naming the `owner/repo` the release came from.
pub const REPOSITORY_ENV: &str = "GITHUB_REPOSITORY";

/// Used when no repository is configured anywhere.
pub const PLACEHOLDER_REPOSITORY: &str = "OWNER/REPO";

/// Default config file looked up next to the binary under test.
pub const CONFIG_FILE_NAME: &str = "provcheck.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// `owner/repo`; overridden by `GITHUB_REPOSITORY` and `--repo`. Only
    /// honoured from an explicitly named config file.
    pub repository: Option<String>,
    /// OIDC issuer the signing certificate must come from.
    pub oidc_issuer: String,
    /// File name of the packaged release artifact.
    pub artifact_name: String,
    /// SBOM entries describing the artifact itself rather than a dependency.
    pub self_package_names: Vec<String>,
    /// Case-insensitive substrings marking a copyleft license.
    pub copyleft_markers: Vec<String>,
    /// Asset name fragments reported by the artifact metadata check.
    pub expected_artifacts: Vec<String>,
    pub timeouts: Timeouts,
}

/// Per-tool time budgets, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub signing: u64,
    pub attestation: u64,
    pub scanner: u64,
    pub release_list: u64,
    pub release_view: u64,
    pub version_probe: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            signing: 30,
            attestation: 30,
            scanner: 60,
            release_list: 30,
            release_view: 10,
            version_probe: 5,
        }
    }
}

impl Timeouts {
    pub fn signing(&self) -> Duration {
        Duration::from_secs(self.signing)
    }

    pub fn attestation(&self) -> Duration {
        Duration::from_secs(self.attestation)
    }

    pub fn scanner(&self) -> Duration {
        Duration::from_secs(self.scanner)
    }

    pub fn release_list(&self) -> Duration {
        Duration::from_secs(self.release_list)
    }

    pub fn release_view(&self) -> Duration {
        Duration::from_secs(self.release_view)
    }

    pub fn version_probe(&self) -> Duration {
        Duration::from_secs(self.version_probe)
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            repository: None,
            oidc_issuer: "https://token.actions.githubusercontent.com".to_string(),
            artifact_name: env!("CARGO_PKG_NAME").to_string(),
            self_package_names: vec![env!("CARGO_PKG_NAME").to_string(), ".".to_string()],
            copyleft_markers: vec!["GPL".to_string(), "AGPL".to_string(), "LGPL".to_string()],
            expected_artifacts: vec![
                "sbom".to_string(),
                ".sigstore".to_string(),
                "checksums".to_string(),
            ],
            timeouts: Timeouts::default(),
        }
    }
}

impl VerifyConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let bytes = crate::fs_guard::read_validated(p, MAX_CONFIG_BYTES)?;
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse config {}", p.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Takes the operational settings from a config shipped in the evidence
    /// directory. Fields that decide what counts as trusted (`repository`,
    /// `oidc_issuer`, `self_package_names`, `copyleft_markers`) stay as they
    /// are: the release being verified must not be able to relax its own
    /// checks.
    pub fn with_evidence_overrides(self, shipped: VerifyConfig) -> Self {
        Self {
            expected_artifacts: shipped.expected_artifacts,
            timeouts: shipped.timeouts,
            ..self
        }
    }

    /// Picks the repository identifier: explicit flag, then environment, then
    /// config file, then the placeholder. Blank values are skipped.
    pub fn resolve_repository(&self, flag: Option<&str>, env: Option<&str>) -> String {
        let present = |s: &&str| !s.trim().is_empty();
        flag.filter(present)
            .or(env.filter(present))
            .or(self.repository.as_deref().filter(present))
            .unwrap_or(PLACEHOLDER_REPOSITORY)
            .to_string()
    }
}
