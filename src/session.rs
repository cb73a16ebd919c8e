//! Verification session and report.
//!
//! A [`Session`] pins down everything the checks share (binary, version,
//! repository, config, tool runner). [`Session::run`] walks the battery once,
//! with no short-circuit, and returns an immutable [`Report`].

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    env,
    fmt::Write as _,
    path::{Path, PathBuf},
};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::checks::{run_check, CheckContext, BATTERY};
use crate::config::{VerifyConfig, CONFIG_FILE_NAME, REPOSITORY_ENV};
use crate::locate::{resolve_binary, resolve_version, EvidenceLocator, RunningProcess};
use crate::result::CheckResult;
use crate::tools::ToolRunner;

pub const REPORT_SCHEMA: &str = "provcheck/report/v1";

/// Caller-supplied overrides for a session. Everything left `None` is
/// discovered.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyRequest<'a> {
    pub binary: Option<&'a Path>,
    pub repository: Option<&'a str>,
    pub config: Option<&'a Path>,
}

pub struct Session<'r> {
    binary: PathBuf,
    version: String,
    repository: String,
    config: VerifyConfig,
    runner: &'r dyn ToolRunner,
}

impl<'r> Session<'r> {
    /// Resolves the binary, configuration, repository and version.
    ///
    /// Fails only when no binary can be resolved or an explicitly named
    /// config file is unusable. When no config path is given, a
    /// `provcheck.json` next to the binary may adjust timeouts and expected
    /// artifacts; if it cannot be read it is ignored with a warning.
    pub fn resolve(
        request: VerifyRequest<'_>,
        runner: &'r dyn ToolRunner,
        process: &RunningProcess,
    ) -> Result<Self> {
        let mut config = VerifyConfig::load(request.config)?;
        let binary = resolve_binary(request.binary, process, &config.artifact_name)?;

        if request.config.is_none() {
            let sibling = EvidenceLocator::new(&binary).dir().join(CONFIG_FILE_NAME);
            if sibling.exists() {
                match VerifyConfig::load(Some(&sibling)) {
                    Ok(shipped) => {
                        debug!(path = %sibling.display(), "applying config found next to binary");
                        config = config.with_evidence_overrides(shipped);
                    }
                    Err(e) => warn!(
                        path = %sibling.display(),
                        error = %format!("{e:#}"),
                        "ignoring unusable config next to binary"
                    ),
                }
            }
        }

        let env_repo = env::var(REPOSITORY_ENV).ok();
        let repository = config.resolve_repository(request.repository, env_repo.as_deref());
        let version = resolve_version(&binary, process, runner, &config);
        debug!(binary = %binary.display(), %version, %repository, "session resolved");

        Ok(Self {
            binary,
            version,
            repository,
            config,
            runner,
        })
    }

    /// Builds a session from already-resolved parts.
    pub fn new(
        binary: PathBuf,
        version: impl Into<String>,
        repository: impl Into<String>,
        config: VerifyConfig,
        runner: &'r dyn ToolRunner,
    ) -> Self {
        Self {
            binary,
            version: version.into(),
            repository: repository.into(),
            config,
            runner,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Runs all fourteen checks in order.
    pub fn run(&self) -> Report {
        if !self.binary.is_file() {
            warn!(binary = %self.binary.display(), "binary does not exist; checks will fail");
        }
        let ctx = CheckContext {
            evidence: EvidenceLocator::new(&self.binary),
            repository: &self.repository,
            version: &self.version,
            config: &self.config,
            runner: self.runner,
        };
        let results = BATTERY
            .iter()
            .map(|(kind, check)| run_check(*kind, *check, &ctx))
            .collect();
        Report::new(self, results)
    }
}

/// Outcome of one session. Serialises to the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    report_schema: &'static str,
    provcheck_version: &'static str,
    binary: String,
    version: String,
    repository: String,
    verified_at: String,
    results: Vec<CheckResult>,
    passed: usize,
    total: usize,
    all_passed: bool,
}

impl Report {
    fn new(session: &Session<'_>, results: Vec<CheckResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        let total = results.len();
        Self {
            report_schema: REPORT_SCHEMA,
            provcheck_version: env!("CARGO_PKG_VERSION"),
            binary: session.binary.display().to_string(),
            version: session.version.clone(),
            repository: session.repository.clone(),
            verified_at: time::OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            results,
            passed,
            total,
            all_passed: passed == total,
        }
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn all_passed(&self) -> bool {
        self.all_passed
    }

    /// 0 iff every check passed.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize report")
    }

    /// Plain-text rendering for terminals and logs.
    pub fn render_text(&self) -> String {
        let name = Path::new(&self.binary)
            .file_name()
            .map_or_else(|| self.binary.clone(), |n| n.to_string_lossy().into_owned());

        let mut out = String::new();
        let _ = writeln!(out, "Verifying {name}");
        let _ = writeln!(out, "Version: {}", self.version);
        let _ = writeln!(out, "Repository: {}", self.repository);
        out.push('\n');

        for r in &self.results {
            let mark = if r.passed() { '✓' } else { '✗' };
            let _ = writeln!(out, "{mark} {}: {}", r.name(), r.message());
            if let Some(d) = r.details() {
                let _ = writeln!(out, "  {d}");
            }
        }

        let mark = if self.all_passed { '✓' } else { '✗' };
        let _ = writeln!(out, "\n{mark} {}/{} checks passed", self.passed, self.total);
        if !self.all_passed {
            out.push_str(
                "\nSome verifications failed or were skipped.\n\
                 This may be expected if:\n  \
                 - this is a development build, not a packaged release\n  \
                 - cosign, gh or osv-scanner is not installed\n  \
                 - attestation files are not present locally\n",
            );
        }
        out
    }
}
