use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::{fs, path::Path};

/// Upper bound for any JSON evidence document (bundles, SBOMs, metadata).
pub const MAX_EVIDENCE_BYTES: u64 = 20 * 1024 * 1024;

/// Upper bound for plain-text evidence such as checksum manifests.
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Reads an evidence file after verifying it is not a symlink and is within
/// `max_bytes`.
///
/// NOTE: narrow TOCTOU window between `symlink_metadata()` and `fs::read()`.
/// Evidence is treated as immutable once released, so the check is aimed at
/// accidental links dropped next to a download rather than an active attacker.
pub fn read_validated(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let meta = fs::symlink_metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if meta.file_type().is_symlink() {
        return Err(anyhow!("Refusing to read symlink: {}", path.display()));
    }
    if !meta.is_file() {
        return Err(anyhow!("Not a regular file: {}", path.display()));
    }
    if meta.len() > max_bytes {
        return Err(anyhow!(
            "File too large: {} ({} bytes, max {max_bytes} bytes)",
            path.display(),
            meta.len(),
        ));
    }
    fs::read(path).with_context(|| format!("read {}", path.display()))
}

/// Reads a UTF-8 text file through [`read_validated`].
pub fn read_text(path: &Path, max_bytes: u64) -> Result<String> {
    let bytes = read_validated(path, max_bytes)?;
    String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path.display()))
}

/// Reads and parses a JSON document through [`read_validated`].
pub fn read_json(path: &Path) -> Result<Value> {
    let bytes = read_validated(path, MAX_EVIDENCE_BYTES)?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse JSON {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_json_parses_document() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("doc.json");
        fs::write(&p, r#"{"bomFormat": "CycloneDX"}"#).unwrap();
        let v = read_json(&p).unwrap();
        assert_eq!(v["bomFormat"], "CycloneDX");
    }

    #[test]
    fn test_read_json_reports_parse_error() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("broken.json");
        fs::write(&p, "{not json").unwrap();
        let err = read_json(&p).unwrap_err().to_string();
        assert!(err.contains("parse JSON"), "{err}");
    }

    #[test]
    fn test_rejects_oversized_file() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("big.txt");
        fs::write(&p, vec![b'a'; 64]).unwrap();
        let err = read_validated(&p, 16).unwrap_err().to_string();
        assert!(err.contains("too large"), "{err}");
    }

    #[test]
    fn test_rejects_directory() {
        let dir = TempDir::new().unwrap();
        assert!(read_validated(dir.path(), 1024).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("checksums.real");
        fs::write(&real, "abc  demo.bin\n").unwrap();
        let link = dir.path().join("checksums.txt");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let err = read_text(&link, MAX_MANIFEST_BYTES).unwrap_err().to_string();
        assert!(err.contains("symlink"), "{err}");
    }
}
