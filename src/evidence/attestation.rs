//! in-toto attestation bundles (`attestation.jsonl`).
//!
//! Each line is one record, in any of three shapes:
//!
//! - a bare in-toto Statement (`_type`, `subject`, `predicateType`,
//!   `predicate`);
//! - a DSSE envelope (`payloadType` + base64 `payload`) whose payload is a
//!   Statement;
//! - a Sigstore bundle carrying such an envelope under `dsseEnvelope`, which
//!   is what `gh attestation download` writes.
//!
//! Envelope signatures are not checked here; that is delegated to
//! `gh attestation verify`. This module only extracts what was attested.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Statement {
    #[serde(rename = "predicateType", default)]
    pub predicate_type: Option<String>,
    #[serde(default)]
    pub subject: Vec<Subject>,
    #[serde(default)]
    pub predicate: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub digest: BTreeMap<String, String>,
}

impl Subject {
    /// File-name component of the subject name (`dist/demo.bin` → `demo.bin`).
    pub fn basename(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }

    pub fn sha256(&self) -> Option<&str> {
        self.digest.get("sha256").map(String::as_str)
    }
}

impl Statement {
    /// `predicateType` mentions SLSA (case-insensitive).
    pub fn is_slsa(&self) -> bool {
        self.predicate_type
            .as_deref()
            .is_some_and(|t| t.to_ascii_lowercase().contains("slsa"))
    }

    pub fn names_subject(&self, file_name: &str) -> bool {
        self.subject.iter().any(|s| s.basename() == file_name)
    }

    /// Builder identity, SLSA v0.2 layout first, then v1.
    pub fn builder_id(&self) -> Option<&str> {
        self.predicate_str(&["/builder/id", "/runDetails/builder/id"])
    }

    pub fn build_type(&self) -> Option<&str> {
        self.predicate_str(&["/buildType", "/buildDefinition/buildType"])
    }

    /// Workflow definition reference (v0.2 `configSource.uri`, v1 workflow path).
    pub fn workflow_ref(&self) -> Option<&str> {
        self.predicate_str(&[
            "/invocation/configSource/uri",
            "/buildDefinition/externalParameters/workflow/path",
        ])
    }

    fn predicate_str(&self, pointers: &[&str]) -> Option<&str> {
        pointers
            .iter()
            .filter_map(|p| self.predicate.pointer(p).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }
}

/// Parses every record of a JSONL attestation bundle into a [`Statement`].
///
/// Blank lines and non-object records are skipped. A line that is not JSON
/// at all is an error: the bundle is malformed.
pub fn parse_statements(text: &str) -> Result<Vec<Statement>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(line)
            .with_context(|| format!("attestation line {} is not JSON", idx + 1))?;
        if !record.is_object() {
            continue;
        }
        let statement = unwrap_envelope(&record).unwrap_or(record);
        let parsed: Statement = serde_json::from_value(statement)
            .with_context(|| format!("attestation line {} is not an in-toto statement", idx + 1))?;
        out.push(parsed);
    }
    Ok(out)
}

/// Decodes the statement carried by a DSSE envelope, directly or inside a
/// Sigstore bundle. Returns `None` if the record is not an envelope or its
/// payload does not decode, in which case the record is used as-is.
fn unwrap_envelope(record: &Value) -> Option<Value> {
    let envelope = match record.get("dsseEnvelope") {
        Some(inner) => inner,
        None => record,
    };
    envelope.get("payloadType")?;
    let payload = envelope.get("payload")?.as_str()?;
    let bytes = BASE64.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
