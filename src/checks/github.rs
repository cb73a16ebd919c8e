//! Checks answered by the GitHub CLI: attestation verification and release
//! metadata. These need network access; without `gh` they degrade to a
//! "not installed" result instead of failing closed.

use serde::Deserialize;
use tracing::debug;

use crate::result::{CheckKind, CheckResult};
use crate::tools::{Tool, ToolCommand, ToolError};

use super::{tool_failure, CheckContext};

/// Predicate type GitHub uses for SPDX SBOM attestations.
pub const SPDX_PREDICATE_TYPE: &str = "https://spdx.dev/Document";

/// How many recent releases are searched for the binary.
const RELEASE_SCAN_LIMIT: u32 = 20;

const RELEASE_FIELDS: &str = "tagName,name,assets,body";

fn attestation_verify(ctx: &CheckContext<'_>) -> ToolCommand {
    ToolCommand::tool(Tool::Gh, ctx.config.timeouts.attestation())
        .args(["attestation", "verify"])
        .arg(ctx.binary())
        .arg("--repo")
        .arg(ctx.repository)
}

/// `gh attestation verify` against the configured repository.
pub fn attestation(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::GithubAttestation;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    match ctx.runner.run(&attestation_verify(ctx)) {
        Ok(out) if out.success() => kind
            .pass("GitHub attestation verified")
            .with_details(format!("Repository: {}", ctx.repository)),
        Ok(out) => {
            let r = kind.fail("Attestation verification failed");
            match out.stderr_detail() {
                Some(d) => r.with_details(d),
                None => r,
            }
        }
        Err(e) => tool_failure(kind, Tool::Gh, &e),
    }
}

/// Same as [`attestation`], restricted to the SPDX predicate. Older releases
/// predate SBOM attestations, so a miss is reported without alarm.
pub fn sbom_attestation(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::SbomAttestation;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let cmd = attestation_verify(ctx).args(["--predicate-type", SPDX_PREDICATE_TYPE]);
    match ctx.runner.run(&cmd) {
        Ok(out) if out.success() => kind.pass("SBOM attestation verified").with_details(format!(
            "SPDX document attestation for {}",
            ctx.evidence.file_name()
        )),
        Ok(_) => kind
            .fail("SBOM attestation not found or verification failed")
            .with_details("This is expected for releases before SBOM attestation was added"),
        Err(e) => tool_failure(kind, Tool::Gh, &e),
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseRef {
    #[serde(rename = "tagName", default)]
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(rename = "tagName", default)]
    tag_name: String,
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
}

impl Release {
    fn has_asset(&self, name: &str) -> bool {
        self.assets.iter().any(|a| a.name == name)
    }
}

/// Why the release listing could not be consulted.
enum FetchError {
    Tool(ToolError),
    ListFailed,
    BadResponse(serde_json::Error),
}

impl From<ToolError> for FetchError {
    fn from(e: ToolError) -> Self {
        Self::Tool(e)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadResponse(e)
    }
}

/// Finds the release carrying the binary among recent releases, falling back
/// to the latest release. One attempt per call, no retries.
fn find_release(ctx: &CheckContext<'_>) -> Result<Option<Release>, FetchError> {
    let timeouts = &ctx.config.timeouts;
    let list = ToolCommand::tool(Tool::Gh, timeouts.release_list())
        .args(["release", "list", "--repo"])
        .arg(ctx.repository)
        .args(["--json", "tagName", "--limit"])
        .arg(RELEASE_SCAN_LIMIT.to_string());
    let out = ctx.runner.run(&list)?;
    if !out.success() {
        return Err(FetchError::ListFailed);
    }
    let refs: Vec<ReleaseRef> = serde_json::from_str(&out.stdout)?;

    for tag in refs.iter().map(|r| r.tag_name.as_str()).filter(|t| !t.is_empty()) {
        let view = ToolCommand::tool(Tool::Gh, timeouts.release_view())
            .args(["release", "view", tag, "--repo"])
            .arg(ctx.repository)
            .args(["--json", RELEASE_FIELDS]);
        let out = ctx.runner.run(&view)?;
        if !out.success() {
            debug!(tag, "release view failed; skipping");
            continue;
        }
        let release: Release = serde_json::from_str(&out.stdout)?;
        if release.has_asset(ctx.evidence.file_name()) {
            return Ok(Some(release));
        }
    }

    let latest = ToolCommand::tool(Tool::Gh, timeouts.release_list())
        .args(["release", "view", "--repo"])
        .arg(ctx.repository)
        .args(["--json", RELEASE_FIELDS]);
    let out = ctx.runner.run(&latest)?;
    if !out.success() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&out.stdout)?))
}

/// Maps a `vX.Y.Z-alpha.N` style tag to the `X.Y.ZaN` form PEP 440
/// version strings use. A fixed substitution, not a version parser: schemes
/// outside `-alpha.`/`-beta.`/`-rc.` pass through unchanged.
pub fn normalize_prerelease(tag_version: &str) -> String {
    tag_version
        .replace("-alpha.", "a")
        .replace("-beta.", "b")
        .replace("-rc.", "rc")
}

/// Whether `tag` names the release of `version`, with or without a leading
/// `v` and pre-release normalization.
pub fn tag_matches_version(tag: &str, version: &str) -> bool {
    if tag.is_empty() {
        return false;
    }
    let tag_version = tag.trim_start_matches('v');
    let current = version.trim_start_matches('v');
    tag_version == current || normalize_prerelease(tag_version) == current
}

/// The release that shipped this binary is tagged with its version and lists
/// it among its assets.
pub fn artifact_metadata(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::ArtifactMetadata;
    let release = match find_release(ctx) {
        Ok(Some(r)) => r,
        Ok(None) => return kind.fail("No release found"),
        Err(FetchError::Tool(ToolError::Timeout { .. })) => {
            return kind.fail("GitHub API request timeout")
        }
        Err(FetchError::Tool(e)) => return tool_failure(kind, Tool::Gh, &e),
        Err(FetchError::ListFailed) => {
            return kind
                .fail("Could not fetch GitHub release list")
                .with_details("Ensure gh CLI is authenticated")
        }
        Err(FetchError::BadResponse(e)) => {
            return kind
                .fail("Invalid GitHub API response")
                .with_details(crate::result::truncate_detail(&e.to_string()))
        }
    };

    let version_matches = tag_matches_version(&release.tag_name, ctx.version);
    let binary_in_assets = release.has_asset(ctx.evidence.file_name());

    let found: Vec<&str> = ctx
        .config
        .expected_artifacts
        .iter()
        .filter(|want| release.assets.iter().any(|a| a.name.contains(want.as_str())))
        .map(String::as_str)
        .collect();

    let mut parts = Vec::new();
    if version_matches {
        parts.push(format!("Tag: {}", release.tag_name));
    } else {
        parts.push(format!(
            "Tag mismatch: {} != v{}",
            release.tag_name,
            ctx.version.trim_start_matches('v')
        ));
    }
    parts.push(format!("Assets: {}", release.assets.len()));
    parts.push(format!("Expected artifacts: {}", found.join("/")));
    if release.body.as_deref().is_some_and(|b| !b.trim().is_empty()) {
        parts.push("Has release notes".to_string());
    }
    let details = parts.join(" | ");

    let result = if !version_matches {
        kind.fail("Version does not match release tag")
    } else if !binary_in_assets {
        kind.fail("Binary not found in release assets")
    } else {
        kind.pass("Artifact metadata verified")
    };
    result.with_details(details)
}
