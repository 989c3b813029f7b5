//! Crash-safe file writes and content digests for checkpoint and config files.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Replace `path` with `data` so readers see the old or the new content, never
/// a torn write. Parent directories are created as needed.
///
/// The bytes go to a `<path>.tmp` sibling, are synced to disk, then renamed
/// over the target.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)
}

/// Lowercase hex SHA-256 of a blob, as recorded in checkpoint manifests.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
