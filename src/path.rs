use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Slash-separated path relative to a tree root.
///
/// The stored spelling is case-preserving; [`RepoPath::fold`] gives the
/// case-insensitive key. The empty path is the tree root.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RepoPath(String);

impl RepoPath {
    /// Build a path, accepting `\` separators and dropping empty and `.` segments.
    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized = path
            .as_ref()
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/");
        Self(normalized)
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment, empty for the root.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Parent directory; `None` only for the root itself.
    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Ancestor directories from the nearest parent outwards, root excluded.
    pub fn ancestors(&self) -> Vec<RepoPath> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            current = dir.parent();
            ancestors.push(dir);
        }
        ancestors
    }

    /// The first `count` segments.
    pub fn prefix(&self, count: usize) -> RepoPath {
        Self(self.segments().take(count).collect::<Vec<_>>().join("/"))
    }

    pub fn join(&self, segment: &str) -> RepoPath {
        if self.is_root() {
            Self::new(segment)
        } else {
            Self::new(format!("{}/{}", self.0, segment))
        }
    }

    /// Case-folded form used as a comparison key.
    pub fn fold(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn eq_ignore_case(&self, other: &RepoPath) -> bool {
        self.fold() == other.fold()
    }

    /// Whether `prefix` is this path or one of its ancestors, comparing exact spelling.
    pub fn starts_with(&self, prefix: &RepoPath) -> bool {
        let mut own = self.segments();
        prefix.segments().all(|segment| own.next() == Some(segment))
    }

    /// Replace a leading `from` with `to`. Returns `None` when `from` is not a prefix.
    pub fn rebase(&self, from: &RepoPath, to: &RepoPath) -> Option<RepoPath> {
        if !self.starts_with(from) {
            return None;
        }
        let rest: Vec<&str> = self.segments().skip(from.depth()).collect();
        let mut rebased = to.clone();
        for segment in rest {
            rebased = rebased.join(segment);
        }
        Some(rebased)
    }

    /// Longest shared directory of two paths. Leaf names never count as shared.
    pub fn common_dir(&self, other: &RepoPath) -> RepoPath {
        let a: Vec<&str> = self.segments().collect();
        let b: Vec<&str> = other.segments().collect();
        let max = a.len().min(b.len()).saturating_sub(1);
        let shared = a
            .iter()
            .zip(b.iter())
            .take(max)
            .take_while(|(x, y)| x == y)
            .count();
        self.prefix(shared)
    }

    /// Path relative to `dir`, which must be an ancestor.
    pub fn strip_dir(&self, dir: &RepoPath) -> RepoPath {
        Self(self.segments().skip(dir.depth()).collect::<Vec<_>>().join("/"))
    }

    /// Location of this path under a filesystem root.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.segments() {
            path.push(segment);
        }
        path
    }
}

impl Ord for RepoPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments().cmp(other.segments())
    }
}

impl PartialOrd for RepoPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<&str> for RepoPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
