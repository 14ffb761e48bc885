//! Destination version-control clients.
//!
//! Every client is driven serially: one command at a time, each awaited to
//! completion, since the external tools keep per-workspace state.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::path::RepoPath;

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VcsError>;

/// Client for the destination workspace's version-control system.
///
/// Paths are relative to [`VersionControl::root`]. Each call returns the
/// command's standard output.
pub trait VersionControl {
    fn root(&self) -> &Path;

    /// Whether the workspace has no pending changes.
    fn is_clean(&mut self) -> Result<bool>;

    fn add(&mut self, paths: &[RepoPath]) -> Result<String>;

    fn remove(&mut self, paths: &[RepoPath]) -> Result<String>;

    /// Make files writable / tracked as changed before they are overwritten.
    fn checkout(&mut self, paths: &[RepoPath]) -> Result<String>;

    fn move_paths(&mut self, pairs: &[(RepoPath, RepoPath)]) -> Result<String>;
}

/// Run `program` in `cwd`, returning stdout or a [`VcsError::CommandFailed`].
pub fn run_command(program: &str, args: &[String], cwd: &Path) -> Result<String> {
    let command_line = format!("{} {}", program, args.join(" "));
    debug!(cwd = %cwd.display(), "{command_line}");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|source| VcsError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        for line in stdout.lines().filter(|l| !l.is_empty()) {
            debug!("  {line}");
        }
        Ok(stdout)
    } else {
        Err(VcsError::CommandFailed {
            command: command_line,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn path_args(paths: &[RepoPath]) -> Vec<String> {
    paths.iter().map(|p| p.as_str().to_string()).collect()
}

/// Plastic SCM workspace driven through the `cm` client.
#[derive(Debug, Clone)]
pub struct PlasticVcs {
    root: PathBuf,
    program: String,
}

impl PlasticVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            program: "cm".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, subcommand: &str, mut args: Vec<String>) -> Result<String> {
        args.insert(0, subcommand.to_string());
        run_command(&self.program, &args, &self.root)
    }

    fn run_paths(&self, subcommand: &str, paths: &[RepoPath]) -> Result<String> {
        if paths.is_empty() {
            return Ok(String::new());
        }
        self.run(subcommand, path_args(paths))
    }
}

impl VersionControl for PlasticVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_clean(&mut self) -> Result<bool> {
        let stdout = self.run("status", vec!["--machinereadable".to_string()])?;
        // First line is the workspace header; anything after it is a pending change.
        Ok(stdout.lines().skip(1).all(|line| line.trim().is_empty()))
    }

    fn add(&mut self, paths: &[RepoPath]) -> Result<String> {
        self.run_paths("add", paths)
    }

    fn remove(&mut self, paths: &[RepoPath]) -> Result<String> {
        self.run_paths("remove", paths)
    }

    fn checkout(&mut self, paths: &[RepoPath]) -> Result<String> {
        self.run_paths("checkout", paths)
    }

    fn move_paths(&mut self, pairs: &[(RepoPath, RepoPath)]) -> Result<String> {
        let mut stdout = String::new();
        for (from, to) in pairs {
            stdout.push_str(&self.run("move", vec![from.to_string(), to.to_string()])?);
        }
        Ok(stdout)
    }
}

/// Git working tree. Batches are passed through a line-delimited pathspec file.
#[derive(Debug, Clone)]
pub struct GitVcs {
    root: PathBuf,
}

impl GitVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        run_command("git", &args, &self.root)
    }

    /// Git rejects pathspec arguments next to `--pathspec-from-file`, so `args`
    /// must not contain any (nor a `--` separator).
    fn run_with_pathspec(&self, args: &[&str], paths: &[RepoPath]) -> Result<String> {
        if paths.is_empty() {
            return Ok(String::new());
        }
        let mut pathspec = tempfile::NamedTempFile::new()?;
        for path in paths {
            writeln!(pathspec, "{path}")?;
        }
        pathspec.flush()?;
        let flag = format!("--pathspec-from-file={}", pathspec.path().display());
        let mut full: Vec<&str> = args.to_vec();
        full.push(&flag);
        self.run(&full)
    }
}

impl VersionControl for GitVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_clean(&mut self) -> Result<bool> {
        Ok(self.run(&["status", "--porcelain"])?.trim().is_empty())
    }

    fn add(&mut self, paths: &[RepoPath]) -> Result<String> {
        self.run_with_pathspec(&["add"], paths)
    }

    fn remove(&mut self, paths: &[RepoPath]) -> Result<String> {
        // Git does not track directories; empty ones are removed from disk directly.
        let (dirs, files): (Vec<RepoPath>, Vec<RepoPath>) = paths
            .iter()
            .cloned()
            .partition(|p| p.to_fs_path(&self.root).is_dir());
        let stdout = self.run_with_pathspec(&["rm", "-q", "--ignore-unmatch"], &files)?;
        for dir in dirs {
            std::fs::remove_dir(dir.to_fs_path(&self.root))?;
        }
        Ok(stdout)
    }

    fn checkout(&mut self, _paths: &[RepoPath]) -> Result<String> {
        // Git files are always writable.
        Ok(String::new())
    }

    fn move_paths(&mut self, pairs: &[(RepoPath, RepoPath)]) -> Result<String> {
        let mut stdout = String::new();
        for (from, to) in pairs {
            stdout.push_str(&self.run(&["mv", from.as_str(), to.as_str()])?);
        }
        Ok(stdout)
    }
}

/// A plain directory with no version control; operations act on disk directly.
#[derive(Debug, Clone)]
pub struct DirectoryVcs {
    root: PathBuf,
}

impl DirectoryVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl VersionControl for DirectoryVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_clean(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn add(&mut self, _paths: &[RepoPath]) -> Result<String> {
        Ok(String::new())
    }

    fn remove(&mut self, paths: &[RepoPath]) -> Result<String> {
        for path in paths {
            let full = path.to_fs_path(&self.root);
            if full.is_dir() {
                std::fs::remove_dir(&full)?;
            } else {
                std::fs::remove_file(&full)?;
            }
        }
        Ok(String::new())
    }

    fn checkout(&mut self, _paths: &[RepoPath]) -> Result<String> {
        Ok(String::new())
    }

    fn move_paths(&mut self, pairs: &[(RepoPath, RepoPath)]) -> Result<String> {
        for (from, to) in pairs {
            std::fs::rename(from.to_fs_path(&self.root), to.to_fs_path(&self.root))?;
        }
        Ok(String::new())
    }
}

/// Logs every mutating call instead of running it. Queries go to the wrapped client.
pub struct PretendVcs {
    inner: Box<dyn VersionControl>,
}

impl PretendVcs {
    pub fn new(inner: Box<dyn VersionControl>) -> Self {
        Self { inner }
    }
}

impl VersionControl for PretendVcs {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn is_clean(&mut self) -> Result<bool> {
        self.inner.is_clean()
    }

    fn add(&mut self, paths: &[RepoPath]) -> Result<String> {
        for path in paths {
            info!(%path, "pretend: add");
        }
        Ok(String::new())
    }

    fn remove(&mut self, paths: &[RepoPath]) -> Result<String> {
        for path in paths {
            info!(%path, "pretend: remove");
        }
        Ok(String::new())
    }

    fn checkout(&mut self, paths: &[RepoPath]) -> Result<String> {
        for path in paths {
            info!(%path, "pretend: checkout");
        }
        Ok(String::new())
    }

    fn move_paths(&mut self, pairs: &[(RepoPath, RepoPath)]) -> Result<String> {
        for (from, to) in pairs {
            info!(%from, %to, "pretend: move");
        }
        Ok(String::new())
    }
}
