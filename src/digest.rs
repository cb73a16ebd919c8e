//! Streaming SHA-256 of the binary under test.

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::{fs, io::Read, path::Path};

/// Largest binary we are willing to hash.
pub const MAX_BINARY_BYTES: u64 = 2 * 1024 * 1024 * 1024; // 2GB

/// Returns the lowercase hex SHA-256 of `path`, refusing anything but a
/// regular file no larger than `max_size`.
///
/// Symlinks are followed: packaged installs commonly link the binary into a
/// `bin/` directory. Evidence files go through [`crate::fs_guard`] instead,
/// which refuses links.
pub fn sha256_file(path: &Path, max_size: u64) -> Result<String> {
    let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if !meta.is_file() {
        return Err(anyhow!("Not a regular file: {}", path.display()));
    }
    if meta.len() > max_size {
        return Err(anyhow!(
            "File too large: {} ({} bytes, max {max_size} bytes)",
            path.display(),
            meta.len()
        ));
    }

    let mut f = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut h = Sha256::new();
    #[allow(clippy::large_stack_arrays)]
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        #[allow(clippy::indexing_slicing)]
        h.update(&buf[..n]);
    }
    Ok(hex::encode(h.finalize()))
}

/// Shortens a hex digest for display (`abcdef0123456789…`).
pub fn short(digest: &str, len: usize) -> String {
    let prefix: String = digest.chars().take(len).collect();
    if digest.chars().count() > len {
        format!("{prefix}…")
    } else {
        prefix
    }
}
