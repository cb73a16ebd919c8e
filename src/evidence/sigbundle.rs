//! Transparency-log metadata embedded in Sigstore signature bundles.
//!
//! Two bundle shapes exist in the wild:
//!
//! - the protobuf-JSON Sigstore bundle (`verificationMaterial.tlogEntries[]`,
//!   with `logId.keyId` and stringified integers);
//! - the legacy `cosign sign-blob --bundle` output (`rekorBundle.Payload`,
//!   with `logID` as a hex string and numeric fields).

use serde_json::Value;
use time::{macros::format_description, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleShape {
    Protobuf,
    LegacyCosign,
}

/// The first transparency-log entry of a bundle. Every field is optional
/// here; the caller decides which are mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlogEntry {
    pub shape: BundleShape,
    pub log_index: Option<i64>,
    pub log_id: Option<String>,
    pub integrated_time: Option<i64>,
}

impl TlogEntry {
    /// Names of the identifying fields this entry lacks.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.log_index.is_none() {
            missing.push("logIndex");
        }
        if self.log_id.is_none() {
            missing.push("logId");
        }
        if self.integrated_time.is_none() {
            missing.push("integratedTime");
        }
        missing
    }

    /// Log id shortened to 16 characters for display.
    pub fn key_hint(&self) -> String {
        match &self.log_id {
            Some(id) if id.chars().count() > 16 => {
                format!("{}...", id.chars().take(16).collect::<String>())
            }
            Some(id) => id.clone(),
            None => "unknown".to_string(),
        }
    }

    pub fn timestamp(&self) -> String {
        self.integrated_time
            .and_then(format_unix_utc)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Extracts the first tlog entry, trying the protobuf shape before the
/// legacy one. `None` when the bundle records no entry at all.
pub fn first_tlog_entry(bundle: &Value) -> Option<TlogEntry> {
    if let Some(entry) = bundle
        .pointer("/verificationMaterial/tlogEntries")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
    {
        return Some(TlogEntry {
            shape: BundleShape::Protobuf,
            log_index: entry.get("logIndex").and_then(int_like),
            log_id: entry
                .pointer("/logId/keyId")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            integrated_time: entry.get("integratedTime").and_then(int_like),
        });
    }

    let payload = bundle.pointer("/rekorBundle/Payload")?;
    if !payload.as_object().is_some_and(|m| !m.is_empty()) {
        return None;
    }
    Some(TlogEntry {
        shape: BundleShape::LegacyCosign,
        log_index: payload.get("logIndex").and_then(int_like),
        log_id: payload
            .get("logID")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        integrated_time: payload.get("integratedTime").and_then(int_like),
    })
}

/// Protobuf-JSON encodes 64-bit integers as strings; accept both.
fn int_like(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `2023-11-14 22:13:20 UTC`.
pub fn format_unix_utc(secs: i64) -> Option<String> {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    OffsetDateTime::from_unix_timestamp(secs)
        .ok()?
        .format(&fmt)
        .ok()
}
