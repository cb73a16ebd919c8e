//! Resolves the binary under test and the evidence files released beside it.

use std::{
    env,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::VerifyConfig;
use crate::tools::{probe_version, ToolRunner};

pub const ATTESTATION_FILE: &str = "attestation.jsonl";
pub const BUILD_METADATA_FILE: &str = "build-metadata.json";
pub const OSV_RESULTS_FILE: &str = "osv-scan-results.json";
pub const CHECKSUMS_FILE: &str = "checksums.txt";

/// SBOM file names, in the order they are consulted.
pub const SBOM_FILES: [&str; 3] = ["sbom.spdx.json", "sbom.cyclonedx.json", "sbom.json"];

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("binary not found: pass --file, or run from a packaged release")]
    BinaryNotFound,
}

/// Facts about the running process used to find "ourselves".
#[derive(Debug, Clone, Default)]
pub struct RunningProcess {
    /// The running executable, if the OS can tell us.
    pub executable: Option<PathBuf>,
    /// Directories of the executable search path.
    pub search_path: Vec<PathBuf>,
    /// Root of the installation (two levels above the executable).
    pub install_root: Option<PathBuf>,
}

impl RunningProcess {
    pub fn detect() -> Self {
        let executable = env::current_exe().ok();
        let install_root = executable
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let search_path = env::var_os("PATH")
            .map(|p| env::split_paths(&p).collect())
            .unwrap_or_default();
        Self {
            executable,
            search_path,
            install_root,
        }
    }
}

/// Resolves the binary to verify.
///
/// Order: the explicit path; the running executable when it is the packaged
/// artifact; the first match for the artifact name on the search path; the
/// conventional `<install_root>/dist/<artifact>` output location.
pub fn resolve_binary(
    explicit: Option<&Path>,
    process: &RunningProcess,
    artifact_name: &str,
) -> Result<PathBuf, LocateError> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }

    if let Some(exe) = &process.executable {
        if exe.file_name().is_some_and(|n| n == artifact_name) && exe.is_file() {
            debug!(path = %exe.display(), "verifying the running executable");
            return Ok(exe.clone());
        }
    }

    for dir in &process.search_path {
        let hit = WalkDir::new(dir)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .find(|e| e.file_name() == artifact_name && e.path().is_file());
        if let Some(entry) = hit {
            debug!(path = %entry.path().display(), "found packaged artifact on search path");
            return Ok(entry.into_path());
        }
    }

    if let Some(root) = &process.install_root {
        let p = root.join("dist").join(artifact_name);
        if p.is_file() {
            return Ok(p);
        }
    }

    Err(LocateError::BinaryNotFound)
}

/// Version string to compare against release tags.
///
/// An external binary is asked for its own version; otherwise, or if that
/// fails, the version this crate was built as is used.
pub fn resolve_version(
    binary: &Path,
    process: &RunningProcess,
    runner: &dyn ToolRunner,
    config: &VerifyConfig,
) -> String {
    let own_version = option_env!("CARGO_PKG_VERSION")
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown");

    if is_external(binary, process) && binary.is_file() {
        if let Some(v) = probe_version(runner, binary, config.timeouts.version_probe()) {
            return v;
        }
        debug!(path = %binary.display(), "version probe failed; using own version");
    }
    own_version.to_string()
}

fn is_external(binary: &Path, process: &RunningProcess) -> bool {
    let Some(exe) = &process.executable else {
        return true;
    };
    match (binary.canonicalize(), exe.canonicalize()) {
        (Ok(a), Ok(b)) => a != b,
        _ => binary != exe.as_path(),
    }
}

/// Candidate evidence paths for one binary. Nothing here touches the disk
/// except [`first_existing`].
#[derive(Debug, Clone)]
pub struct EvidenceLocator {
    binary: PathBuf,
    dir: PathBuf,
    file_name: String,
}

impl EvidenceLocator {
    pub fn new(binary: &Path) -> Self {
        let dir = binary
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            binary: binary.to_path_buf(),
            dir,
            file_name,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn checksum_candidates(&self) -> Vec<PathBuf> {
        let mut sidecar = self.binary.as_os_str().to_owned();
        sidecar.push(".sha256");
        dedup(vec![
            self.dir.join(CHECKSUMS_FILE),
            self.dir.join(format!("{}.sha256", self.file_name)),
            PathBuf::from(sidecar),
        ])
    }

    pub fn signature_bundle_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.dir.join(format!("{}.sigstore", self.file_name)),
            self.dir.join(format!("{}.sigstore.json", self.file_name)),
        ]
    }

    pub fn attestation(&self) -> PathBuf {
        self.dir.join(ATTESTATION_FILE)
    }

    pub fn build_metadata(&self) -> PathBuf {
        self.dir.join(BUILD_METADATA_FILE)
    }

    pub fn osv_results(&self) -> PathBuf {
        self.dir.join(OSV_RESULTS_FILE)
    }

    pub fn sbom_candidates(&self) -> Vec<PathBuf> {
        SBOM_FILES.iter().map(|f| self.dir.join(f)).collect()
    }

    /// SBOMs handed to the vulnerability scanner; the last candidate is the
    /// per-binary `<stem>.sbom.json`.
    pub fn scanner_sbom_candidates(&self) -> Vec<PathBuf> {
        let stem = self
            .binary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        dedup(vec![
            self.dir.join("sbom.spdx.json"),
            self.dir.join("sbom.json"),
            self.dir.join(format!("{stem}.sbom.json")),
        ])
    }
}

/// First candidate that exists, or `None`.
pub fn first_existing(candidates: &[PathBuf]) -> Option<&PathBuf> {
    candidates.iter().find(|p| p.exists())
}

/// `a, b, c` rendering of a candidate list for "expected at" messages.
pub fn describe(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn dedup(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for p in paths {
        if !out.contains(&p) {
            out.push(p);
        }
    }
    out
}
