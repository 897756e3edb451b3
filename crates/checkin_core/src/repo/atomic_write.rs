//! Crash-safe whole-file replacement.
//!
//! # Invariants
//! - Readers observe either the complete old file or the complete new file.
//! - The temporary file lives in the target directory so the final rename
//!   never crosses filesystems.

use super::store_repo::{RepoError, RepoResult};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `contents` to a sibling temporary file, syncs it, then renames it
/// over `path`. Missing parent directories are created.
pub fn write_atomic(path: &Path, contents: &[u8]) -> RepoResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| RepoError::io(parent, err))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|err| RepoError::io(path, err))?;
    temp.write_all(contents)
        .map_err(|err| RepoError::io(path, err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| RepoError::io(path, err))?;
    temp.persist(path)
        .map_err(|err| RepoError::io(path, err.error))?;
    Ok(())
}
