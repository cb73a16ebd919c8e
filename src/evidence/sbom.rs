//! CycloneDX and SPDX SBOM documents, reduced to a common component list.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbomFormat {
    CycloneDx,
    Spdx,
}

impl fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CycloneDx => f.write_str("CycloneDX"),
            Self::Spdx => f.write_str("SPDX"),
        }
    }
}

/// One dependency entry, whichever schema it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub version: String,
    /// Declared license identifiers or expressions; empty when unlicensed.
    pub licenses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sbom {
    pub format: SbomFormat,
    pub components: Vec<Component>,
}

impl Sbom {
    /// Recognises a document by its discriminator: `bomFormat == "CycloneDX"`
    /// or the presence of `spdxVersion`. Anything else is `None`.
    pub fn from_value(doc: &Value) -> Option<Self> {
        if doc.get("bomFormat").and_then(Value::as_str) == Some("CycloneDX") {
            let components = list(doc, "components").iter().map(cyclonedx_component).collect();
            return Some(Self {
                format: SbomFormat::CycloneDx,
                components,
            });
        }
        if doc.get("spdxVersion").is_some() {
            let components = list(doc, "packages").iter().map(spdx_package).collect();
            return Some(Self {
                format: SbomFormat::Spdx,
                components,
            });
        }
        None
    }

    /// "components" for CycloneDX, "packages" for SPDX.
    pub fn unit_noun(&self) -> &'static str {
        match self.format {
            SbomFormat::CycloneDx => "components",
            SbomFormat::Spdx => "packages",
        }
    }

    /// `CycloneDX (12 components)`.
    pub fn summary(&self) -> String {
        format!("{} ({} {})", self.format, self.components.len(), self.unit_noun())
    }
}

fn list<'a>(doc: &'a Value, key: &str) -> &'a [Value] {
    doc.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn cyclonedx_component(c: &Value) -> Component {
    let licenses = list(c, "licenses")
        .iter()
        .filter_map(|entry| {
            entry
                .pointer("/license/id")
                .or_else(|| entry.pointer("/license/name"))
                .or_else(|| entry.get("expression"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        })
        .collect();
    Component {
        name: c.get("name").and_then(Value::as_str).unwrap_or("unknown").to_string(),
        version: text(c, "version"),
        licenses,
    }
}

fn spdx_package(p: &Value) -> Component {
    let license = ["licenseConcluded", "licenseDeclared"]
        .iter()
        .filter_map(|k| p.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty());
    let licenses = license
        .filter(|l| *l != "NOASSERTION")
        .map(|l| vec![l.to_string()])
        .unwrap_or_default();
    Component {
        name: p.get("name").and_then(Value::as_str).unwrap_or("unknown").to_string(),
        version: text(p, "versionInfo"),
        licenses,
    }
}
