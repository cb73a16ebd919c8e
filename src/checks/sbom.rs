//! Checks that read the released SBOM: presence, vulnerability scan, license
//! families and version pinning.

use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::evidence::sbom::Sbom;
use crate::fs_guard::read_json;
use crate::locate::{describe, first_existing};
use crate::result::{CheckKind, CheckResult};
use crate::tools::{ScanVerdict, Tool, ToolCommand};

use super::{tool_failure, CheckContext};

/// Characters that make a version a range or wildcard rather than an exact pin.
const UNPINNED_MARKERS: [char; 5] = ['*', '^', '~', '>', '<'];

/// Unpinned names are listed in details only up to this many.
const MAX_LISTED_UNPINNED: usize = 3;

const MAX_LISTED_COPYLEFT: usize = 3;

fn load_sbom(path: &Path) -> Option<Sbom> {
    match read_json(path) {
        Ok(doc) => Sbom::from_value(&doc),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unreadable SBOM");
            None
        }
    }
}

/// First candidate that parses as a recognised schema.
fn first_sbom(ctx: &CheckContext<'_>) -> Option<Sbom> {
    ctx.evidence
        .sbom_candidates()
        .iter()
        .filter(|p| p.exists())
        .find_map(|p| load_sbom(p))
}

/// At least one SBOM candidate is a CycloneDX or SPDX document listing
/// components.
pub fn sbom(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::Sbom;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let candidates = ctx.evidence.sbom_candidates();
    let found: Vec<String> = candidates
        .iter()
        .filter(|p| p.exists())
        .filter_map(|p| load_sbom(p))
        .filter(|s| !s.components.is_empty())
        .map(|s| s.summary())
        .collect();

    if found.is_empty() {
        return kind
            .fail("No valid SBOM files found")
            .with_details(format!("Expected at: {}", describe(&candidates)));
    }
    kind.pass(format!("Valid SBOMs in {} format(s)", found.len()))
        .with_details(format!("Formats: {}", found.join(", ")))
}

/// Number of vulnerable packages in osv-scanner JSON output, summed over
/// every scanned source. `None` if the document has no `results` list.
fn vulnerable_packages(doc: &Value) -> Option<usize> {
    let results = doc.get("results")?.as_array()?;
    Some(
        results
            .iter()
            .filter_map(|r| r.get("packages").and_then(Value::as_array))
            .map(Vec::len)
            .sum(),
    )
}

/// Known vulnerabilities, from the scan cached at release time or a live
/// `osv-scanner` run over the SBOM.
pub fn osv_scan(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::OsvScan;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }

    let cached = ctx.evidence.osv_results();
    if cached.exists() {
        match read_json(&cached).map(|doc| vulnerable_packages(&doc)) {
            Ok(Some(0)) => {
                return kind
                    .pass("No known vulnerabilities found")
                    .with_details("Pre-scanned results from release")
            }
            Ok(Some(n)) => {
                return kind
                    .fail(format!("Found vulnerabilities in {n} package(s)"))
                    .with_details("See osv-scan-report.txt for details")
            }
            Ok(None) => debug!("cached scan has no results list; scanning live"),
            Err(e) => debug!(error = %e, "cached scan unreadable; scanning live"),
        }
    }

    let candidates = ctx.evidence.scanner_sbom_candidates();
    let Some(sbom_path) = first_existing(&candidates) else {
        return kind
            .fail("SBOM not found for scanning")
            .with_details(format!("Expected one of: {}", describe(&candidates)));
    };

    let cmd = ToolCommand::tool(Tool::OsvScanner, ctx.config.timeouts.scanner())
        .arg("--sbom")
        .arg(sbom_path)
        .args(["--format", "json"]);
    let out = match ctx.runner.run(&cmd) {
        Ok(out) => out,
        Err(e) => return tool_failure(kind, Tool::OsvScanner, &e),
    };

    let rerun = format!("Run 'osv-scanner --sbom {}' for details", sbom_path.display());
    match ScanVerdict::from_exit_code(out.code) {
        ScanVerdict::Clean => kind
            .pass("No known vulnerabilities found")
            .with_details("Scanned against OSV database"),
        ScanVerdict::VulnerabilitiesFound => {
            let count = serde_json::from_str::<Value>(&out.stdout)
                .ok()
                .and_then(|doc| vulnerable_packages(&doc));
            let r = match count {
                Some(n) => kind.fail(format!("Found vulnerabilities in {n} package(s)")),
                None => kind.fail("Vulnerabilities detected"),
            };
            r.with_details(rerun)
        }
        ScanVerdict::ToolFailure => {
            let r = kind.fail("Scan failed");
            match out.stderr_detail() {
                Some(d) => r.with_details(d),
                None => r,
            }
        }
    }
}

/// Fails if any declared license belongs to a copyleft family.
pub fn license_compliance(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::LicenseCompliance;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let Some(sbom) = first_sbom(ctx).filter(|s| !s.components.is_empty()) else {
        return kind.fail("No SBOM found with license information");
    };

    let licenses: BTreeSet<&str> = sbom
        .components
        .iter()
        .flat_map(|c| c.licenses.iter().map(String::as_str))
        .collect();
    let licensed = sbom.components.iter().filter(|c| !c.licenses.is_empty()).count();

    let markers: Vec<String> = ctx
        .config
        .copyleft_markers
        .iter()
        .map(|m| m.to_ascii_uppercase())
        .collect();
    let copyleft: Vec<&str> = licenses
        .iter()
        .copied()
        .filter(|l| {
            let upper = l.to_ascii_uppercase();
            markers.iter().any(|m| upper.contains(m.as_str()))
        })
        .collect();

    let message = format!("License check: {} unique licenses", licenses.len());
    if copyleft.is_empty() {
        kind.pass(message).with_details(format!(
            "{} unique licenses, {licensed}/{} packages licensed",
            licenses.len(),
            sbom.components.len()
        ))
    } else {
        let listed: Vec<&str> = copyleft.iter().copied().take(MAX_LISTED_COPYLEFT).collect();
        kind.fail(message)
            .with_details(format!("Found copyleft: {}", listed.join(", ")))
    }
}

fn is_pinned(version: &str) -> bool {
    !version.is_empty() && !version.contains(UNPINNED_MARKERS)
}

/// Every dependency other than the package itself names an exact version.
pub fn dependency_pinning(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::DependencyPinning;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let deps: Vec<_> = first_sbom(ctx)
        .map(|s| s.components)
        .unwrap_or_default()
        .into_iter()
        .filter(|c| !ctx.config.self_package_names.iter().any(|own| *own == c.name))
        .collect();
    if deps.is_empty() {
        return kind.fail("No SBOM found with dependency information");
    }

    let total = deps.len();
    let unpinned: Vec<&str> = deps
        .iter()
        .filter(|c| !is_pinned(&c.version))
        .map(|c| c.name.as_str())
        .collect();
    if unpinned.is_empty() {
        return kind
            .pass(format!("All {total} dependencies pinned to specific versions"))
            .with_details(format!("100% pinned ({total}/{total})"));
    }

    let pinned = total - unpinned.len();
    // Dependency counts are far below f64's exact integer range.
    #[allow(clippy::cast_precision_loss)]
    let percent = pinned as f64 / total as f64 * 100.0;
    let mut details = format!(
        "{percent:.1}% pinned ({pinned}/{total}) | {} unpinned",
        unpinned.len()
    );
    if unpinned.len() <= MAX_LISTED_UNPINNED {
        details.push_str(&format!(": {}", unpinned.join(", ")));
    }
    kind.fail(format!("Dependency pinning: {pinned}/{total} pinned"))
        .with_details(details)
}
