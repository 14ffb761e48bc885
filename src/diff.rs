//! Raw diff providers.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::vcs::run_command;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("invalid cache key regex"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("invalid cache key regex"));

/// Source of `<mode>\t<path>[\t<target>]` lines describing one change set.
pub trait DiffProvider {
    fn diff_lines(&self) -> Result<Vec<String>>;
}

/// A diff saved to a file, one change per line.
#[derive(Debug, Clone)]
pub struct DiffFile {
    path: PathBuf,
}

impl DiffFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DiffProvider for DiffFile {
    fn diff_lines(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read diff file {}", self.path.display()))?;
        Ok(content.lines().map(str::to_string).collect())
    }
}

/// Stores command output on disk so repeated runs skip slow commands.
#[derive(Debug, Clone)]
pub struct CommandCache {
    dir: PathBuf,
}

impl CommandCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create command cache {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// File holding the output of `command`.
    pub fn entry_path(&self, command: &[String]) -> PathBuf {
        self.dir.join(format!("{}.stdout", cache_key(command)))
    }

    pub fn read(&self, command: &[String]) -> Option<String> {
        std::fs::read_to_string(self.entry_path(command)).ok()
    }

    pub fn write(&self, command: &[String], stdout: &str) -> Result<()> {
        let path = self.entry_path(command);
        std::fs::write(&path, stdout)
            .with_context(|| format!("failed to write cache entry {}", path.display()))
    }
}

/// Filesystem-safe name for a command line.
fn cache_key(command: &[String]) -> String {
    let joined = command.join("_").to_lowercase();
    let cleaned = NON_WORD.replace_all(&joined, "");
    SEPARATORS
        .replace_all(&cleaned, "-")
        .trim_matches(['-', '_'])
        .to_string()
}

/// `git diff --name-status <from> <to>` in a local clone.
#[derive(Debug, Clone)]
pub struct GitDiff {
    repo: PathBuf,
    from: String,
    to: String,
    cache: Option<CommandCache>,
}

impl GitDiff {
    pub fn new(repo: impl Into<PathBuf>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            from: from.into(),
            to: to.into(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CommandCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn command(&self) -> Vec<String> {
        vec![
            "diff".to_string(),
            "--name-status".to_string(),
            self.from.clone(),
            self.to.clone(),
        ]
    }
}

impl DiffProvider for GitDiff {
    fn diff_lines(&self) -> Result<Vec<String>> {
        let args = self.command();
        let mut key = vec!["git".to_string()];
        key.extend(args.iter().cloned());

        if let Some(stdout) = self.cache.as_ref().and_then(|cache| cache.read(&key)) {
            debug!(command = %key.join(" "), "reading diff from command cache");
            return Ok(stdout.lines().map(str::to_string).collect());
        }

        let stdout = run_command("git", &args, &self.repo)
            .with_context(|| format!("git diff {}..{} failed", self.from, self.to))?;
        if let Some(cache) = &self.cache {
            debug!(command = %key.join(" "), "writing diff to command cache");
            cache.write(&key, &stdout)?;
        }
        Ok(stdout.lines().map(str::to_string).collect())
    }
}
