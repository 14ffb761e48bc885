//! Validated run configuration built from command-line arguments.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

use crate::cli::{ImportArgs, PlanArgs, SourceArgs};
use crate::diff::{CommandCache, DiffFile, DiffProvider, GitDiff};
use crate::vcs::{DirectoryVcs, GitVcs, PlasticVcs, PretendVcs, VersionControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum VcsKind {
    /// Plastic SCM workspace, driven through `cm`.
    #[default]
    Plastic,
    /// Git working tree.
    Git,
    /// Plain directory without version control.
    None,
}

/// Where the raw diff lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSource {
    File(PathBuf),
    Git {
        repo: PathBuf,
        from: String,
        to: String,
    },
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub source: PathBuf,
    pub workspace: PathBuf,
    pub diff: DiffSource,
    pub vcs: VcsKind,
    pub command_cache: Option<PathBuf>,
    pub json: bool,
    pub pretend: bool,
    pub continue_on_error: bool,
    pub validate_only: bool,
    pub batch_size: usize,
    pub max_ops: Option<usize>,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("cannot resolve {}", path.display()))?
        .into_owned())
}

impl ImportConfig {
    fn from_source_args(args: &SourceArgs) -> Result<Self> {
        let diff = match (&args.diff_file, &args.git_repo, &args.from, &args.to) {
            (Some(file), None, _, _) => DiffSource::File(absolute(file)?),
            (None, Some(repo), Some(from), Some(to)) => DiffSource::Git {
                repo: absolute(repo)?,
                from: from.clone(),
                to: to.clone(),
            },
            _ => bail!("either --diff-file or --git-repo with --from and --to is required"),
        };

        Ok(Self {
            source: absolute(&args.source)?,
            workspace: absolute(&args.workspace)?,
            diff,
            vcs: args.vcs,
            command_cache: args.command_cache.as_deref().map(absolute).transpose()?,
            json: args.json,
            pretend: false,
            continue_on_error: false,
            validate_only: false,
            batch_size: 100,
            max_ops: None,
        })
    }

    pub fn from_import_args(args: &ImportArgs) -> Result<Self> {
        let config = Self {
            pretend: args.pretend,
            continue_on_error: args.continue_on_error,
            validate_only: args.validate_only,
            batch_size: args.batch_size,
            max_ops: args.max_ops,
            ..Self::from_source_args(&args.source)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_plan_args(args: &PlanArgs) -> Result<Self> {
        let config = Self::from_source_args(&args.source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        if !self.source.is_dir() {
            bail!("source {} is not a directory", self.source.display());
        }
        if !self.workspace.is_dir() {
            bail!("workspace {} is not a directory", self.workspace.display());
        }
        match &self.diff {
            DiffSource::File(path) if !path.is_file() => {
                bail!("diff file {} does not exist", path.display())
            }
            DiffSource::Git { repo, .. } if !repo.is_dir() => {
                bail!("git repository {} is not a directory", repo.display())
            }
            _ => Ok(()),
        }
    }

    pub fn diff_provider(&self) -> Result<Box<dyn DiffProvider>> {
        Ok(match &self.diff {
            DiffSource::File(path) => Box::new(DiffFile::new(path)),
            DiffSource::Git { repo, from, to } => {
                let mut diff = GitDiff::new(repo, from.clone(), to.clone());
                if let Some(dir) = &self.command_cache {
                    diff = diff.with_cache(CommandCache::open(dir)?);
                }
                Box::new(diff)
            }
        })
    }

    /// The workspace client, wrapped so that nothing is changed in pretend mode.
    pub fn version_control(&self) -> Box<dyn VersionControl> {
        let vcs: Box<dyn VersionControl> = match self.vcs {
            VcsKind::Plastic => Box::new(PlasticVcs::new(&self.workspace)),
            VcsKind::Git => Box::new(GitVcs::new(&self.workspace)),
            VcsKind::None => Box::new(DirectoryVcs::new(&self.workspace)),
        };
        if self.pretend {
            Box::new(PretendVcs::new(vcs))
        } else {
            vcs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn import_args(extra: &[&str], dir: &Path) -> ImportArgs {
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::create_dir_all(dir.join("ws")).unwrap();
        std::fs::write(dir.join("diff.txt"), "").unwrap();

        let source = dir.join("src");
        let workspace = dir.join("ws");
        let diff = dir.join("diff.txt");
        let mut argv = vec![
            "vendorsync".to_string(),
            "import".to_string(),
            "--source".to_string(),
            source.display().to_string(),
            "--workspace".to_string(),
            workspace.display().to_string(),
            "--diff-file".to_string(),
            diff.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Import(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = import_args(&["--batch-size", "0"], dir.path());
        let err = ImportConfig::from_import_args(&args).unwrap_err();
        assert!(err.to_string().contains("batch size"));
    }

    #[test]
    fn missing_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = import_args(&[], dir.path());
        std::fs::remove_dir(dir.path().join("ws")).unwrap();
        assert!(ImportConfig::from_import_args(&args).is_err());
    }

    #[test]
    fn paths_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let args = import_args(&["--pretend", "--max-ops", "5"], dir.path());
        let config = ImportConfig::from_import_args(&args).unwrap();
        assert!(config.source.is_absolute());
        assert!(config.pretend);
        assert_eq!(config.max_ops, Some(5));
        assert_eq!(config.diff, DiffSource::File(dir.path().join("diff.txt")));
    }
}
