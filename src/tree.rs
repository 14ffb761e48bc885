use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::fsops;
use crate::path::RepoPath;
use crate::resolve;

/// Read-only view of a file tree.
///
/// The source snapshot is consumed through this trait; the destination
/// workspace is inspected through it as well during validation.
pub trait FileTree {
    fn file_exists(&self, path: &RepoPath) -> bool;

    fn read(&self, path: &RepoPath) -> std::io::Result<Vec<u8>>;

    /// How the file at `path` is actually spelled, `None` when it is missing.
    ///
    /// Only a case-insensitive tree can answer with a different spelling.
    fn actual_spelling(&self, path: &RepoPath) -> Option<RepoPath> {
        self.file_exists(path).then(|| path.clone())
    }

    /// Write the file's contents to `dst`, returning the bytes written.
    fn copy_to(&self, path: &RepoPath, dst: &Path) -> Result<u64> {
        let bytes = self.read(path)?;
        std::fs::write(dst, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Whether `path` has identical bytes in both trees.
pub fn same_content(a: &dyn FileTree, b: &dyn FileTree, path: &RepoPath) -> bool {
    match (a.read(path), b.read(path)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// A tree rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirTree {
    root: PathBuf,
}

impl DirTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &RepoPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    pub fn is_dir(&self, path: &RepoPath) -> bool {
        self.resolve(path).is_dir()
    }
}

impl FileTree for DirTree {
    fn file_exists(&self, path: &RepoPath) -> bool {
        !path.is_root() && self.resolve(path).is_file()
    }

    fn read(&self, path: &RepoPath) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn actual_spelling(&self, path: &RepoPath) -> Option<RepoPath> {
        if !self.file_exists(path) {
            return None;
        }
        resolve::on_disk_spelling(path, &self.root).ok().flatten()
    }

    fn copy_to(&self, path: &RepoPath, dst: &Path) -> Result<u64> {
        fsops::copy_file(&self.resolve(path), dst)
    }
}
