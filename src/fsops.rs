use anyhow::{Context, Result};
use std::path::Path;

/// Create a directory and any missing parents.
pub fn mkdir(dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory {}", dst.display()))?;
    Ok(())
}

/// Copy a file including permissions and access/modification times.
///
/// Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(src)
        .with_context(|| format!("source not found: {}", src.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("not a regular file: {}", src.display());
    }
    let bytes = std::fs::copy(src, dst)
        .with_context(|| format!("copy failed: {} -> {}", src.display(), dst.display()))?;

    let atime = filetime::FileTime::from_last_access_time(&metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(dst, atime, mtime)
        .with_context(|| format!("failed to set file times on {}", dst.display()))?;
    Ok(bytes)
}

/// Whether `path` is an existing directory with no entries.
pub fn is_empty_dir(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}
