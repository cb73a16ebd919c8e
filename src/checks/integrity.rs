use crate::digest::short;
use crate::evidence::manifest::expected_digest;
use crate::fs_guard::{read_text, MAX_MANIFEST_BYTES};
use crate::locate::{describe, first_existing};
use crate::result::{CheckKind, CheckResult};

use super::CheckContext;

/// Recomputes the binary's SHA-256 and compares it with the release manifest.
pub fn checksum(ctx: &CheckContext<'_>) -> CheckResult {
    let kind = CheckKind::Checksum;
    if let Some(r) = ctx.missing_binary(kind) {
        return r;
    }

    let actual = match ctx.binary_sha256() {
        Ok(d) => d,
        Err(e) => return kind.error("Unable to calculate binary checksum", &e),
    };

    let candidates = ctx.evidence.checksum_candidates();
    let Some(manifest) = first_existing(&candidates) else {
        return kind
            .fail("Release checksum manifest not found")
            .with_details(format!("Expected one of: {}", describe(&candidates)));
    };

    let text = match read_text(manifest, MAX_MANIFEST_BYTES) {
        Ok(t) => t,
        Err(e) => return kind.error("Failed to read checksum manifest", &e),
    };

    let Some(expected) = expected_digest(&text, ctx.evidence.file_name()) else {
        return kind
            .fail("Binary missing from checksum manifest")
            .with_details(format!("Manifest: {}", manifest.display()));
    };

    if !actual.eq_ignore_ascii_case(expected) {
        return kind.fail("SHA256 checksum mismatch").with_details(format!(
            "Calculated {}, expected {}",
            short(&actual, 16),
            short(expected, 16)
        ));
    }

    let manifest_name = manifest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    kind.pass("SHA256 checksum matches release manifest")
        .with_details(format!(
            "Checksum: {} (manifest: {manifest_name})",
            short(&actual, 16)
        ))
}
