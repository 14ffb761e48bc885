use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use vendorsync::cli::{ImportArgs, PlanArgs, SourceArgs};
use vendorsync::config::VcsKind;
use vendorsync::engine::plan_report;
use vendorsync::job::build_jobs;
use vendorsync::model::{OpKind, PlanReport};
use vendorsync::tree::DirTree;

struct Fixture {
    _dir: TempDir,
    source: PathBuf,
    workspace: PathBuf,
    diff: PathBuf,
}

impl Fixture {
    fn new(diff: &[&str]) -> Result<Self> {
        let dir = tempdir()?;
        let source = dir.path().join("drop");
        let workspace = dir.path().join("workspace");
        fs::create_dir(&source)?;
        fs::create_dir(&workspace)?;
        let diff_path = dir.path().join("changes.txt");
        fs::write(&diff_path, diff.join("\n"))?;
        Ok(Self {
            _dir: dir,
            source,
            workspace,
            diff: diff_path,
        })
    }

    fn source_file(&self, path: &str, content: &str) -> Result<()> {
        write(&self.source, path, content)
    }

    fn workspace_file(&self, path: &str, content: &str) -> Result<()> {
        write(&self.workspace, path, content)
    }

    fn read(&self, path: &str) -> String {
        fs::read_to_string(self.workspace.join(path)).unwrap()
    }

    fn source_args(&self) -> SourceArgs {
        SourceArgs {
            source: self.source.clone(),
            workspace: self.workspace.clone(),
            diff_file: Some(self.diff.clone()),
            git_repo: None,
            from: None,
            to: None,
            command_cache: None,
            vcs: VcsKind::None,
            json: false,
        }
    }

    fn import_args(&self) -> ImportArgs {
        ImportArgs {
            source: self.source_args(),
            pretend: false,
            continue_on_error: true,
            validate_only: false,
            batch_size: 2,
            max_ops: None,
        }
    }

    fn plan(&self) -> Result<PlanReport> {
        let lines = fs::read_to_string(&self.diff)?;
        let changes = vendorsync::classify::classify(lines.lines())?;
        let source = DirTree::new(&self.source);
        let destination = DirTree::new(&self.workspace);
        let jobs = build_jobs(changes, &destination);
        Ok(plan_report(&jobs, &source, &destination))
    }

    /// Number of operations that would still be executed.
    fn valid_op_count(&self) -> Result<usize> {
        Ok(self
            .plan()?
            .jobs
            .iter()
            .flat_map(|job| &job.operations)
            .filter(|op| op.valid)
            .count())
    }

    /// Valid operation paths per non-empty job, in execution order.
    fn planned(&self) -> Result<Vec<(OpKind, Vec<String>)>> {
        Ok(self
            .plan()?
            .jobs
            .into_iter()
            .map(|job| {
                let paths: Vec<String> = job
                    .operations
                    .iter()
                    .filter(|op| op.valid)
                    .map(|op| op.path.to_string())
                    .collect();
                (job.kind, paths)
            })
            .filter(|(_, paths)| !paths.is_empty())
            .collect())
    }
}

/// Relative paths of every entry under `root`, sorted.
fn snapshot(root: &Path) -> Vec<String> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            entry.path().strip_prefix(root).unwrap().display().to_string()
        })
        .collect()
}

fn write(root: &Path, path: &str, content: &str) -> Result<()> {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap())?;
    fs::write(full, content)?;
    Ok(())
}

#[test]
fn test_import_add_delete_modify() -> Result<()> {
    let fx = Fixture::new(&["a\tnew.txt", "d\told.txt", "m\tkept.txt"])?;
    fx.source_file("new.txt", "new")?;
    fx.source_file("kept.txt", "v2")?;
    fx.workspace_file("old.txt", "old")?;
    fx.workspace_file("kept.txt", "v1")?;

    assert_eq!(fx.valid_op_count()?, 3);
    assert_eq!(
        fx.planned()?,
        vec![
            (OpKind::Add, vec!["new.txt".to_string()]),
            (OpKind::Delete, vec!["old.txt".to_string()]),
            (OpKind::Modify, vec!["kept.txt".to_string()]),
        ]
    );
    let exit_code = vendorsync::engine::import(fx.import_args())?;
    assert_eq!(exit_code, 0);

    assert_eq!(fx.read("new.txt"), "new");
    assert_eq!(fx.read("kept.txt"), "v2");
    assert!(!fx.workspace.join("old.txt").exists());
    Ok(())
}

#[test]
fn test_second_run_has_nothing_to_do() -> Result<()> {
    let fx = Fixture::new(&[
        "a\tsub/new.txt",
        "d\tgone/old.txt",
        "m\tkept.txt",
        "r087\tsrc/Name.cpp\tsource/Name.cpp",
    ])?;
    fx.source_file("sub/new.txt", "new")?;
    fx.source_file("kept.txt", "v2")?;
    fx.source_file("source/Name.cpp", "int main() {}")?;
    fx.workspace_file("gone/old.txt", "old")?;
    fx.workspace_file("kept.txt", "v1")?;
    fx.workspace_file("src/Name.cpp", "int main();")?;

    assert_eq!(vendorsync::engine::import(fx.import_args())?, 0);
    assert_eq!(fx.valid_op_count()?, 0);
    assert_eq!(fx.read("source/Name.cpp"), "int main() {}");
    assert!(!fx.workspace.join("src").exists());
    assert!(!fx.workspace.join("gone").exists());
    Ok(())
}

#[test]
fn test_delete_then_add_of_same_name_moves() -> Result<()> {
    let fx = Fixture::new(&["d\told/name.txt", "a\tnew/name.txt"])?;
    fx.source_file("new/name.txt", "moved")?;
    fx.workspace_file("old/name.txt", "original")?;

    let changes = vendorsync::classify::classify(["d\told/name.txt", "a\tnew/name.txt"])?;
    assert_eq!(changes.moves.len(), 1);
    assert!(changes.adds.is_empty() && changes.deletes.is_empty());

    assert_eq!(vendorsync::engine::import(fx.import_args())?, 0);
    assert_eq!(fx.read("new/name.txt"), "moved");
    assert!(!fx.workspace.join("old").exists());
    Ok(())
}

#[test]
fn test_applied_move_is_treated_as_modify() -> Result<()> {
    let fx = Fixture::new(&["r100\told/a.txt\tnew/a.txt"])?;
    fx.source_file("new/a.txt", "v2")?;
    fx.workspace_file("new/a.txt", "v1")?;

    assert_eq!(vendorsync::engine::import(fx.import_args())?, 0);
    assert_eq!(fx.read("new/a.txt"), "v2");
    assert!(!fx.workspace.join("old").exists());
    Ok(())
}

#[test]
fn test_invalid_operations_are_skipped() -> Result<()> {
    let fx = Fixture::new(&["a\tmissing.txt", "a\tpresent.txt", "d\tnot-there.txt"])?;
    fx.source_file("present.txt", "here")?;

    let exit_code = vendorsync::engine::import(fx.import_args())?;
    assert_eq!(exit_code, 1);
    assert_eq!(fx.read("present.txt"), "here");
    assert!(!fx.workspace.join("missing.txt").exists());
    Ok(())
}

#[test]
fn test_pretend_changes_nothing() -> Result<()> {
    let fx = Fixture::new(&["a\tdir/new.txt", "d\tgone/old.txt", "r100\ta.txt\tb/a.txt"])?;
    fx.source_file("dir/new.txt", "new")?;
    fx.source_file("b/a.txt", "a")?;
    fx.workspace_file("gone/old.txt", "old")?;
    fx.workspace_file("a.txt", "a")?;

    let before = snapshot(&fx.workspace);
    let mut args = fx.import_args();
    args.pretend = true;
    assert_eq!(vendorsync::engine::import(args)?, 0);

    assert_eq!(snapshot(&fx.workspace), before);
    assert_eq!(fx.read("gone/old.txt"), "old");
    assert_eq!(fx.read("a.txt"), "a");
    Ok(())
}

#[test]
fn test_validate_only_reports_without_executing() -> Result<()> {
    let fx = Fixture::new(&["a\tnew.txt", "a\tmissing.txt"])?;
    fx.source_file("new.txt", "new")?;

    let mut args = fx.import_args();
    args.validate_only = true;
    assert_eq!(vendorsync::engine::import(args)?, 1);
    assert!(!fx.workspace.join("new.txt").exists());
    Ok(())
}

#[test]
fn test_max_ops_limits_the_run() -> Result<()> {
    let fx = Fixture::new(&["a\ta.txt", "a\tb.txt", "a\tc.txt"])?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        fx.source_file(name, name)?;
    }

    let mut args = fx.import_args();
    args.max_ops = Some(2);
    assert_eq!(vendorsync::engine::import(args)?, 0);
    assert!(fx.workspace.join("a.txt").exists());
    assert!(fx.workspace.join("b.txt").exists());
    assert!(!fx.workspace.join("c.txt").exists());
    Ok(())
}

#[test]
fn test_malformed_diff_is_a_precondition_failure() -> Result<()> {
    let fx = Fixture::new(&["a\tnew.txt", "x\tbogus.txt"])?;
    fx.source_file("new.txt", "new")?;

    assert_eq!(vendorsync::engine::import(fx.import_args())?, 2);
    assert!(!fx.workspace.join("new.txt").exists());
    Ok(())
}

#[test]
fn test_add_into_new_parent_then_move_into_it() -> Result<()> {
    let fx = Fixture::new(&["a\tlib/util.h", "r100\tutil.c\tlib/util.c"])?;
    fx.source_file("lib/util.h", "h")?;
    fx.source_file("lib/util.c", "c")?;
    fx.workspace_file("util.c", "c")?;

    assert_eq!(vendorsync::engine::import(fx.import_args())?, 0);
    assert_eq!(fx.read("lib/util.h"), "h");
    assert_eq!(fx.read("lib/util.c"), "c");
    assert!(!fx.workspace.join("util.c").exists());
    Ok(())
}

#[test]
fn test_plan_executes_nothing() -> Result<()> {
    let fx = Fixture::new(&["a\tnew.txt"])?;
    fx.source_file("new.txt", "new")?;

    let exit_code = vendorsync::engine::plan(PlanArgs {
        source: fx.source_args(),
    })?;
    assert_eq!(exit_code, 0);
    assert!(!fx.workspace.join("new.txt").exists());
    Ok(())
}
