//! Checksum manifests: `checksums.txt` listings and `.sha256` sidecars.

use std::path::Path;

/// Finds the expected digest for `file_name` in a manifest.
///
/// Accepts a bare digest (the common `.sha256` sidecar form) or
/// `<hex> <filename>` lines, where the filename may carry the binary-mode `*`
/// prefix and a directory component. Blank lines and `#` comments are
/// skipped. The first line that applies wins.
pub fn expected_digest<'a>(manifest: &'a str, file_name: &str) -> Option<&'a str> {
    for line in manifest.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let digest = parts.next()?;
        let Some(listed) = parts.last() else {
            return Some(digest);
        };
        let listed = listed.trim_start_matches('*');
        let listed_name = Path::new(listed)
            .file_name()
            .map(|n| n.to_string_lossy());
        if listed_name.as_deref() == Some(file_name) {
            return Some(digest);
        }
    }
    None
}
