//! Git LFS blob store.
//!
//! LFS payloads are written out-of-band as content-addressed blobs under a
//! destination repository's git directory, and the commit stream carries a
//! small pointer file in their place.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

/// Magic first line of every Git LFS pointer file.
const LFS_POINTER_PREFIX: &str = "version https://git-lfs.github.com/spec/v1\n";

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Path of the blob for `oid` below `lfs_root` (a repository's `.git` dir).
fn object_path(lfs_root: &Path, oid: &str) -> PathBuf {
    lfs_root
        .join("lfs")
        .join("objects")
        .join(&oid[0..2])
        .join(&oid[2..4])
        .join(oid)
}

/// Store `bytes` in the LFS object store under `lfs_root` and return the
/// pointer text to commit in its place.
///
/// The blob lands at `<lfs_root>/lfs/objects/<aa>/<bb>/<oid>` where `aa`/`bb`
/// are the first two byte pairs of the OID. Storing the same bytes twice is
/// idempotent.
pub fn store_blob(bytes: &[u8], lfs_root: &Path) -> std::io::Result<String> {
    let oid = sha256_hex(bytes);
    let path = object_path(lfs_root, &oid);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(&path)?;
    file.write_all(bytes)?;

    debug!(oid = %oid, size = bytes.len(), "stored lfs blob");
    Ok(format!(
        "{LFS_POINTER_PREFIX}oid sha256:{oid}\nsize {}\n",
        bytes.len()
    ))
}

/// The `.gitattributes` content routing the configured patterns through LFS.
/// Empty when no patterns are configured.
pub fn gitattributes_body(patterns: &[String]) -> String {
    let mut body = String::new();
    for pattern in patterns {
        body.push_str(pattern);
        body.push_str(" filter=lfs diff=lfs merge=lfs -text\n");
    }
    body
}
