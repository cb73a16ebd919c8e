//! Build provenance checks over the released attestation bundle and build
//! metadata.

use anyhow::Result;
use tracing::debug;

use crate::digest::short;
use crate::evidence::attestation::{parse_statements, Statement};
use crate::evidence::sigbundle::format_unix_utc;
use crate::evidence::walk::{find_field, scalar_text};
use crate::fs_guard::{read_json, read_text, MAX_EVIDENCE_BYTES};
use crate::result::{CheckKind, CheckResult};

use super::CheckContext;

/// Build-time variable that pins embedded timestamps.
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

fn load_statements(ctx: &CheckContext<'_>) -> Result<Vec<Statement>> {
    let text = read_text(&ctx.evidence.attestation(), MAX_EVIDENCE_BYTES)?;
    parse_statements(&text)
}

/// An SLSA statement in the bundle names the binary with its exact digest.
pub fn slsa_provenance(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::SlsaProvenance;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let bundle = ctx.evidence.attestation();
    if !bundle.exists() {
        return kind
            .fail("Attestation bundle not found")
            .with_details(format!("Expected at: {}", bundle.display()));
    }

    let statements = match load_statements(ctx) {
        Ok(s) => s,
        Err(e) => return kind.error("Provenance verification error", &e),
    };
    if statements.is_empty() {
        return kind
            .fail("Attestation bundle is empty or unreadable")
            .with_details(format!("File: {}", bundle.display()));
    }

    let actual = match ctx.binary_sha256() {
        Ok(d) => d,
        Err(e) => return kind.error("Unable to calculate binary checksum", &e),
    };

    let slsa: Vec<&Statement> = statements.iter().filter(|s| s.is_slsa()).collect();
    if slsa.is_empty() {
        return kind
            .fail("No SLSA provenance in attestation bundle")
            .with_details(format!("Found {} attestation(s)", statements.len()));
    }

    let file_name = ctx.evidence.file_name();
    let mut mismatch: Option<String> = None;
    for statement in &slsa {
        for subject in statement.subject.iter().filter(|s| s.basename() == file_name) {
            let attested = subject.sha256().unwrap_or_default().to_ascii_lowercase();
            if attested == actual {
                return kind.pass("SLSA provenance attestation verified").with_details(format!(
                    "Builder: {} | Build type: {}",
                    statement.builder_id().unwrap_or("unknown"),
                    statement.build_type().unwrap_or("unknown")
                ));
            }
            mismatch.get_or_insert(attested);
        }
    }

    match mismatch {
        Some(attested) => kind
            .fail("Attestation digest does not match binary")
            .with_details(format!(
                "Attested {}, calculated {}",
                short(&attested, 16),
                short(&actual, 16)
            )),
        None => kind
            .fail("Attestation bundle does not cover binary")
            .with_details(format!("Binary: {file_name}")),
    }
}

/// Describes where the binary was built, from its SLSA provenance.
pub fn build_environment(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::BuildEnvironment;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    if !ctx.evidence.attestation().exists() {
        return kind.fail("Provenance file not found");
    }
    let statements = match load_statements(ctx) {
        Ok(s) => s,
        Err(e) => return kind.error("Failed to verify build environment", &e),
    };

    let file_name = ctx.evidence.file_name();
    let slsa = statements.iter().filter(|s| s.is_slsa());
    let Some(statement) = slsa
        .clone()
        .find(|s| s.names_subject(file_name))
        .or_else(|| slsa.clone().next())
    else {
        return kind.fail("No SLSA provenance found");
    };

    let builder = statement.builder_id().unwrap_or("unknown");
    let mut parts = vec![if builder.to_ascii_lowercase().contains("github") {
        "Builder: GitHub Actions".to_string()
    } else {
        format!("Builder: {builder}")
    }];
    if let Some(workflow) = statement.workflow_ref() {
        let last = workflow.rsplit('/').next().unwrap_or(workflow);
        parts.push(format!("Workflow: {last}"));
    }
    kind.pass("Build environment verified from SLSA provenance")
        .with_details(parts.join(" | "))
}

/// First `SOURCE_DATE_EPOCH` in any attestation predicate, then in the build
/// metadata, which takes precedence when both are present.
fn source_date_epoch(ctx: &CheckContext<'_>) -> Option<String> {
    let mut found = None;

    if ctx.evidence.attestation().exists() {
        match load_statements(ctx) {
            Ok(statements) => {
                found = statements
                    .iter()
                    .find_map(|s| find_field(&s.predicate, SOURCE_DATE_EPOCH))
                    .map(scalar_text);
            }
            Err(e) => debug!(error = %e, "attestation bundle unreadable; trying build metadata"),
        }
    }

    let metadata = ctx.evidence.build_metadata();
    if metadata.exists() {
        match read_json(&metadata) {
            Ok(doc) => {
                if let Some(v) = find_field(&doc, SOURCE_DATE_EPOCH) {
                    found = Some(scalar_text(v));
                }
            }
            Err(e) => debug!(error = %e, "build metadata unreadable"),
        }
    }

    found.filter(|v| !v.is_empty())
}

/// The build recorded a valid `SOURCE_DATE_EPOCH`.
pub fn reproducible_build(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::ReproducibleBuild;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }
    let Some(epoch) = source_date_epoch(ctx) else {
        return kind
            .fail("SOURCE_DATE_EPOCH not found in build metadata")
            .with_details("Ensure builds export SOURCE_DATE_EPOCH in provenance or metadata");
    };
    if !epoch.bytes().all(|b| b.is_ascii_digit()) {
        return kind
            .fail("Invalid SOURCE_DATE_EPOCH value")
            .with_details(format!("Value: {epoch}"));
    }

    let when = epoch
        .parse::<i64>()
        .ok()
        .and_then(format_unix_utc)
        .map(|t| format!(" ({t})"))
        .unwrap_or_default();
    kind.pass("Reproducible build verified")
        .with_details(format!("{SOURCE_DATE_EPOCH}: {epoch}{when}"))
}
