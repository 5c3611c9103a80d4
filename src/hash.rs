//! Content hashing of driver folders, for deduplication against external
//! inventories.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// SHA-256 of one file, as a lowercase hex digest.
pub fn sha256_file(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Aggregate SHA-256 over every file under `root`.
///
/// The per-file digests are sorted before being folded into the aggregate,
/// so the result is independent of traversal order. Unreadable entries are
/// skipped rather than failing the aggregate.
pub fn sha256_dir(root: impl AsRef<Path>) -> io::Result<String> {
    let mut digests = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(digest) = sha256_file(entry.path()) {
            digests.push(digest);
        }
    }

    digests.sort_unstable();

    let mut hasher = Sha256::new();
    for digest in &digests {
        hasher.update(digest.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}
