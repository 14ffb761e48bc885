//! On-disk path case resolution.
//!
//! A case-insensitive destination keeps whatever spelling a directory was
//! first created with. When the source renames `Foo/` to `foo/`, the
//! destination has to be told about every mismatched segment explicitly.

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::path::RepoPath;

/// A directory segment whose on-disk spelling differs in case from the requested one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseMismatch {
    /// Segment index within the requested path.
    pub index: usize,
    /// Current on-disk path of the directory, earlier segments already corrected.
    pub from: RepoPath,
    /// Requested path of the directory.
    pub to: RepoPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

/// Compare each ancestor directory of `path` with its spelling on disk under `root`.
///
/// The walk stops at the first directory that does not exist in any case.
/// The leaf itself is not inspected.
pub fn find_case_mismatches(path: &RepoPath, root: &Path) -> io::Result<Vec<CaseMismatch>> {
    let mut mismatches = Vec::new();
    let dirs: Vec<&str> = path.segments().collect();
    let dir_count = dirs.len().saturating_sub(1);

    let mut disk_dir = root.to_path_buf();
    let mut requested = RepoPath::root();
    for (index, segment) in dirs.into_iter().take(dir_count).enumerate() {
        let Some(on_disk) = lookup_entry(&disk_dir, segment)? else {
            break;
        };
        if on_disk != segment {
            mismatches.push(CaseMismatch {
                index,
                from: requested.join(&on_disk),
                to: requested.join(segment),
            });
        }
        disk_dir.push(&on_disk);
        requested = requested.join(segment);
    }
    Ok(mismatches)
}

/// Spelling `path` actually has under `root`, or `None` when no entry matches it in any case.
pub fn on_disk_spelling(path: &RepoPath, root: &Path) -> io::Result<Option<RepoPath>> {
    let mut disk_dir = root.to_path_buf();
    let mut spelled = RepoPath::root();
    for segment in path.segments() {
        let Some(on_disk) = lookup_entry(&disk_dir, segment)? else {
            return Ok(None);
        };
        disk_dir.push(&on_disk);
        spelled = spelled.join(&on_disk);
    }
    Ok(Some(spelled))
}

/// Real name of the entry in `dir` matching `name`, exact spelling first.
fn lookup_entry(dir: &Path, name: &str) -> io::Result<Option<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let folded = name.to_lowercase();
    let mut candidate = None;
    for entry in entries {
        let entry = entry?;
        let Ok(entry_name) = entry.file_name().into_string() else {
            continue;
        };
        if entry_name == name {
            return Ok(Some(entry_name));
        }
        if candidate.is_none() && entry_name.to_lowercase() == folded {
            candidate = Some(entry_name);
        }
    }
    Ok(candidate)
}

/// Probe whether `dir` lives on a case-sensitive filesystem.
///
/// Creates a uniquely named mixed-case marker file, checks whether its
/// lower-cased name resolves, and removes it again.
pub fn probe_case_sensitivity(dir: &Path) -> io::Result<CaseSensitivity> {
    let name = format!(".CaseProbe-{}", uuid::Uuid::new_v4().simple());
    let marker: PathBuf = dir.join(&name);
    std::fs::File::create(&marker)?;
    let lowered = dir.join(name.to_lowercase());
    let result = if lowered.exists() {
        CaseSensitivity::Insensitive
    } else {
        CaseSensitivity::Sensitive
    };
    std::fs::remove_file(&marker)?;
    debug!(dir = %dir.display(), ?result, "probed case sensitivity");
    Ok(result)
}
