//! Jobs: same-kind operations applied to the destination in batches.
//!
//! A job owns its operations and a cursor (`processed_count`) marking how
//! many leading operations have been executed. Operations behind the cursor
//! are history; the rest may still be pruned or trimmed.

use anyhow::{Context, Result};
use bytesize::ByteSize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, error, info};

use crate::classify::ClassifiedChanges;
use crate::fsops;
use crate::model::{Change, OpId, OpKind, OpValidation, Operation};
use crate::path::RepoPath;
use crate::policy::{Decision, FailurePolicy};
use crate::resolve;
use crate::tree::{DirTree, FileTree};
use crate::validate;
use crate::vcs::VersionControl;

/// A batch step that failed while executing already-validated operations.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} step \"{step}\" failed for {} operation(s): {error}", operations.len())]
pub struct ExecutionFailure {
    pub kind: OpKind,
    pub step: String,
    /// Descriptions of the operations in the failed batch.
    pub operations: Vec<String>,
    pub error: String,
}

/// The failure policy chose to stop. Carries the failures recorded so far.
#[derive(Debug, thiserror::Error)]
#[error("aborted after {} failed step(s)", failures.len())]
pub struct Aborted {
    pub failures: Vec<ExecutionFailure>,
}

/// Observer of job progress. Must not influence what gets executed.
pub trait JobListener {
    fn start_job(&mut self, _kind: OpKind, _op_count: usize) {}

    fn end_job(&mut self, _kind: OpKind) {}

    fn start_batch(&mut self, _kind: OpKind, _ops: &[Operation]) {}

    fn end_batch(&mut self, _kind: OpKind, _op_count: usize) {}

    fn start_step(&mut self, _desc: &str) {}

    fn end_step(&mut self, _desc: &str) {}

    fn operation_invalid(&mut self, _op: &Operation, _validation: &OpValidation, _decision: Decision) {}

    fn step_failed(&mut self, _failure: &ExecutionFailure) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default)]
pub struct NoopListener;

impl JobListener for NoopListener {}

/// What a job needs to touch while executing.
pub struct JobContext<'a> {
    pub source: &'a dyn FileTree,
    pub vcs: &'a mut dyn VersionControl,
    /// Log filesystem writes instead of performing them.
    pub pretend: bool,
}

impl JobContext<'_> {
    pub fn destination(&self) -> DirTree {
        DirTree::new(self.vcs.root())
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    kind: OpKind,
    operations: Vec<Operation>,
    processed_count: usize,
}

impl Job {
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            operations: Vec::new(),
            processed_count: 0,
        }
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn unprocessed(&self) -> &[Operation] {
        &self.operations[self.processed_count..]
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.processed_count >= self.operations.len()
    }

    /// Append an operation for `change`, which must be of this job's kind.
    pub fn push(&mut self, change: Change) -> OpId {
        debug_assert_eq!(change.kind(), self.kind, "change filed into the wrong job");
        let op = Operation::new(change);
        let id = op.id();
        self.operations.push(op);
        id
    }

    /// Drop operations beyond the first `max`. Processed operations are kept.
    pub fn trim_trailing(&mut self, max: usize) {
        self.operations.truncate(max.max(self.processed_count));
    }

    /// Prune one unprocessed operation. Returns whether it was found.
    pub fn remove(&mut self, id: OpId) -> bool {
        match self.unprocessed().iter().position(|op| op.id() == id) {
            Some(index) => {
                self.operations.remove(self.processed_count + index);
                true
            }
            None => false,
        }
    }

    /// Validate every unprocessed operation.
    pub fn find_invalid_operations(
        &self,
        source: &dyn FileTree,
        destination: &dyn FileTree,
    ) -> Vec<(Operation, OpValidation)> {
        self.find_invalid_in_next(usize::MAX, source, destination)
    }

    /// Validate the next `count` unprocessed operations.
    pub fn find_invalid_in_next(
        &self,
        count: usize,
        source: &dyn FileTree,
        destination: &dyn FileTree,
    ) -> Vec<(Operation, OpValidation)> {
        self.unprocessed()
            .iter()
            .take(count)
            .filter_map(|op| {
                let validation = validate::validate(op, source, destination);
                (!validation.is_valid()).then(|| (op.clone(), validation))
            })
            .collect()
    }

    /// Execute up to `max_count` unprocessed operations in batches of `batch_size`.
    ///
    /// The cursor advances past each batch once it has been attempted, even when
    /// one of its steps failed, so nothing is retried later in the same run.
    pub fn process(
        &mut self,
        ctx: &mut JobContext<'_>,
        batch_size: usize,
        max_count: Option<usize>,
        listener: &mut dyn JobListener,
        policy: &mut dyn FailurePolicy,
    ) -> Result<Vec<ExecutionFailure>, Aborted> {
        let batch_size = batch_size.max(1);
        let start = self.processed_count;
        let mut count = self.operations.len() - start;
        if let Some(max) = max_count {
            count = count.min(max);
        }

        let mut failures = Vec::new();
        let mut offset = 0;
        while offset < count {
            let end = (offset + batch_size).min(count);
            let batch: Vec<Operation> = self.operations[start + offset..start + end].to_vec();
            listener.start_batch(self.kind, &batch);

            let mut steps = StepRunner {
                kind: self.kind,
                ops: &batch,
                listener: &mut *listener,
                policy: &mut *policy,
                failures: &mut failures,
            };
            let outcome = match self.kind {
                OpKind::Add => process_add(ctx, &batch, &mut steps),
                OpKind::Delete => process_delete(ctx, &batch, &mut steps),
                OpKind::Modify => process_modify(ctx, &batch, &mut steps),
                OpKind::Move => process_move(ctx, &batch, &mut steps),
            };

            listener.end_batch(self.kind, batch.len());
            self.processed_count += batch.len();
            offset = end;
            if outcome.is_err() {
                return Err(Aborted { failures });
            }
        }
        Ok(failures)
    }
}

/// Whether the destination already shows the rename of `source` to `target`.
///
/// A case-only rename is judged by the spelling on disk, since a
/// case-insensitive destination finds both names either way.
pub fn move_applied(source: &RepoPath, target: &RepoPath, destination: &dyn FileTree) -> bool {
    if source.eq_ignore_case(target) {
        return destination.actual_spelling(target).as_ref() == Some(target)
            && destination.actual_spelling(source).as_ref() != Some(source);
    }
    !destination.file_exists(source) && destination.file_exists(target)
}

/// Moves whose rename the destination already shows: source gone, target present.
///
/// They are turned into modifies of the target and the moves are returned.
pub fn reconcile_applied_moves(
    changes: &mut ClassifiedChanges,
    destination: &dyn FileTree,
) -> Vec<Change> {
    let (absorbed, remaining): (Vec<Change>, Vec<Change>) =
        changes.moves.drain(..).partition(|change| match change {
            Change::Move { source, target } => move_applied(source, target, destination),
            _ => false,
        });
    changes.moves = remaining;

    for change in &absorbed {
        if let Some(target) = change.target() {
            debug!(%change, "move already applied, treating as modify");
            changes.modifications.push(Change::Modify(target.clone()));
        }
    }
    changes.sort();
    absorbed
}

/// Turn classified changes into jobs, in the order Add, Delete, Modify, Move.
pub fn build_jobs(changes: ClassifiedChanges, destination: &dyn FileTree) -> Vec<Job> {
    let mut changes = changes;
    reconcile_applied_moves(&mut changes, destination);

    let ClassifiedChanges {
        modifications,
        adds,
        deletes,
        moves,
    } = changes;
    [
        (OpKind::Add, adds),
        (OpKind::Delete, deletes),
        (OpKind::Modify, modifications),
        (OpKind::Move, moves),
    ]
    .into_iter()
    .filter(|(_, list)| !list.is_empty())
    .map(|(kind, list)| {
        let mut job = Job::new(kind);
        for change in list {
            job.push(change);
        }
        job
    })
    .collect()
}

/// Ancestor directories of `paths` missing under `root`, parents first.
pub fn find_dirs_to_create(root: &Path, paths: &[RepoPath]) -> Vec<RepoPath> {
    let mut scheduled = BTreeSet::new();
    for path in paths {
        for dir in path.ancestors() {
            if scheduled.contains(&dir) || dir.to_fs_path(root).is_dir() {
                break;
            }
            scheduled.insert(dir);
        }
    }
    scheduled.into_iter().collect()
}

/// Whether the parent directories differ, but only in case.
fn changes_parent_case(source: &RepoPath, target: &RepoPath) -> bool {
    match (source.parent(), target.parent()) {
        (Some(a), Some(b)) => a != b && a.eq_ignore_case(&b),
        _ => false,
    }
}

/// Directory case renames needed before the moves in `ops`, parents first.
pub fn find_parent_dir_case_changes(
    root: &Path,
    ops: &[Operation],
) -> std::io::Result<Vec<(RepoPath, RepoPath)>> {
    let mut seen = HashSet::new();
    let mut mismatches = Vec::new();
    for op in ops {
        let Some(target) = op.target() else {
            continue;
        };
        if !changes_parent_case(op.path(), target) {
            continue;
        }
        for mismatch in resolve::find_case_mismatches(target, root)? {
            if seen.insert((mismatch.from.clone(), mismatch.to.clone())) {
                mismatches.push(mismatch);
            }
        }
    }
    mismatches.sort_by_key(|m| m.index);
    Ok(mismatches.into_iter().map(|m| (m.from, m.to)).collect())
}

/// Apply directory renames, in order, to a path that lives under them.
fn apply_renames(path: &RepoPath, renames: &[(RepoPath, RepoPath)]) -> RepoPath {
    renames.iter().fold(path.clone(), |current, (from, to)| {
        current.rebase(from, to).unwrap_or(current)
    })
}

/// Source and target of each move still to run once `renames` are applied.
///
/// A move whose rebased source already equals its target was completed by a
/// directory case rename and is left out.
fn pending_moves(ops: &[Operation], renames: &[(RepoPath, RepoPath)]) -> Vec<(RepoPath, RepoPath)> {
    ops.iter()
        .filter_map(|op| {
            let target = op.target()?;
            let source = apply_renames(op.path(), renames);
            (&source != target).then(|| (source, target.clone()))
        })
        .collect()
}

/// Short-circuit marker: the policy asked to stop.
struct Halt;

type StepResult<T> = std::result::Result<T, Halt>;

/// Runs the steps of one batch, reporting them and applying the failure policy.
struct StepRunner<'a> {
    kind: OpKind,
    ops: &'a [Operation],
    listener: &'a mut dyn JobListener,
    policy: &'a mut dyn FailurePolicy,
    failures: &'a mut Vec<ExecutionFailure>,
}

impl StepRunner<'_> {
    /// `Ok(None)` means the step failed and the policy chose to continue.
    fn step<T>(
        &mut self,
        desc: impl Into<String>,
        f: impl FnOnce() -> Result<T>,
    ) -> StepResult<Option<T>> {
        let desc = desc.into();
        self.listener.start_step(&desc);
        let result = f();
        self.listener.end_step(&desc);

        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                let failure = ExecutionFailure {
                    kind: self.kind,
                    step: desc,
                    operations: self.ops.iter().map(|op| op.to_string()).collect(),
                    error: format!("{err:#}"),
                };
                error!("{failure}");
                self.listener.step_failed(&failure);
                let decision = self.policy.on_execution_failure(&failure);
                self.failures.push(failure);
                match decision {
                    Decision::Abort => Err(Halt),
                    Decision::Continue | Decision::ContinueAlways => Ok(None),
                }
            }
        }
    }
}

fn create_parent_dirs(ctx: &mut JobContext<'_>, paths: &[RepoPath]) -> Result<Vec<RepoPath>> {
    let root = ctx.vcs.root().to_path_buf();
    let dirs = find_dirs_to_create(&root, paths);
    for dir in &dirs {
        debug!(%dir, "creating directory");
        if !ctx.pretend {
            fsops::mkdir(&dir.to_fs_path(&root))?;
        }
    }
    Ok(dirs)
}

fn copy_from_source(ctx: &mut JobContext<'_>, paths: &[RepoPath]) -> Result<u64> {
    let root = ctx.vcs.root().to_path_buf();
    let mut bytes = 0;
    for path in paths {
        debug!(%path, "copying from source");
        if ctx.pretend {
            continue;
        }
        bytes += ctx
            .source
            .copy_to(path, &path.to_fs_path(&root))
            .with_context(|| format!("failed to copy {path}"))?;
    }
    debug!(files = paths.len(), size = %ByteSize::b(bytes), "copied files");
    Ok(bytes)
}

/// Remove directories left empty by removing `paths`, walking upwards until a
/// non-empty directory or the workspace root.
fn remove_empty_parent_dirs(ctx: &mut JobContext<'_>, paths: &[RepoPath]) -> Result<usize> {
    let root = ctx.vcs.root().to_path_buf();
    let mut pending: BTreeSet<RepoPath> = paths
        .iter()
        .filter_map(RepoPath::parent)
        .filter(|dir| !dir.is_root())
        .collect();
    let mut removed = HashSet::new();

    loop {
        let empty: Vec<RepoPath> = pending
            .iter()
            .filter(|dir| !removed.contains(*dir) && fsops::is_empty_dir(&dir.to_fs_path(&root)))
            .cloned()
            .collect();
        if empty.is_empty() {
            break;
        }
        for dir in &empty {
            debug!(%dir, "removing empty directory");
        }
        ctx.vcs.remove(&empty)?;

        for dir in empty {
            pending.remove(&dir);
            if let Some(parent) = dir.parent().filter(|p| !p.is_root()) {
                pending.insert(parent);
            }
            removed.insert(dir);
        }
    }
    Ok(removed.len())
}

fn process_add(ctx: &mut JobContext<'_>, ops: &[Operation], steps: &mut StepRunner<'_>) -> StepResult<()> {
    let paths: Vec<RepoPath> = ops.iter().map(|op| op.path().clone()).collect();

    let dirs = steps
        .step("Create missing parent directories", || create_parent_dirs(ctx, &paths))?
        .unwrap_or_default();
    steps.step("Copy files from source", || copy_from_source(ctx, &paths))?;

    let mut to_add: Vec<RepoPath> = dirs.iter().chain(paths.iter()).cloned().collect();
    to_add.sort();
    let desc = format!("Add {} files and {} directories", paths.len(), dirs.len());
    steps.step(desc, || Ok(ctx.vcs.add(&to_add)?))?;
    Ok(())
}

fn process_modify(ctx: &mut JobContext<'_>, ops: &[Operation], steps: &mut StepRunner<'_>) -> StepResult<()> {
    let paths: Vec<RepoPath> = ops.iter().map(|op| op.path().clone()).collect();

    steps.step("Checkout files", || Ok(ctx.vcs.checkout(&paths)?))?;
    steps.step("Copy files from source", || copy_from_source(ctx, &paths))?;
    Ok(())
}

fn process_delete(ctx: &mut JobContext<'_>, ops: &[Operation], steps: &mut StepRunner<'_>) -> StepResult<()> {
    let paths: Vec<RepoPath> = ops.iter().map(|op| op.path().clone()).collect();

    steps.step("Remove files", || Ok(ctx.vcs.remove(&paths)?))?;
    steps.step("Remove empty directories", || remove_empty_parent_dirs(ctx, &paths))?;
    Ok(())
}

fn process_move(ctx: &mut JobContext<'_>, ops: &[Operation], steps: &mut StepRunner<'_>) -> StepResult<()> {
    let targets: Vec<RepoPath> = ops.iter().filter_map(|op| op.target().cloned()).collect();

    let dirs = steps
        .step("Create missing parent directories", || create_parent_dirs(ctx, &targets))?
        .unwrap_or_default();
    if !dirs.is_empty() {
        steps.step("Add created parent directories", || Ok(ctx.vcs.add(&dirs)?))?;
    }

    let renames = steps
        .step("Find parent directory case changes", || {
            Ok(find_parent_dir_case_changes(ctx.vcs.root(), ops)?)
        })?
        .unwrap_or_default();
    info!("found {} parent directory case changes", renames.len());
    if !renames.is_empty() {
        for (from, to) in &renames {
            debug!(%from, %to, "renaming directory");
        }
        steps.step("Rename parent directories with case changes", || {
            Ok(ctx.vcs.move_paths(&renames)?)
        })?;
    }

    let pairs = pending_moves(ops, &renames);
    steps.step("Move files", || Ok(ctx.vcs.move_paths(&pairs)?))?;
    steps.step("Copy files from source", || copy_from_source(ctx, &targets))?;

    let sources: Vec<RepoPath> = ops.iter().map(|op| apply_renames(op.path(), &renames)).collect();
    steps.step("Remove empty directories", || remove_empty_parent_dirs(ctx, &sources))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::policy::{AbortOnError, ContinueOnError};
    use crate::vcs::{DirectoryVcs, VcsError};
    use pretty_assertions::assert_eq;

    fn write(root: &Path, path: &str, content: &str) {
        let full = RepoPath::new(path).to_fs_path(root);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn paths(job: &Job) -> Vec<String> {
        job.operations().iter().map(|op| op.to_string()).collect()
    }

    /// Fails every checkout, delegates everything else to a plain directory.
    struct BrokenCheckout(DirectoryVcs);

    impl VersionControl for BrokenCheckout {
        fn root(&self) -> &Path {
            self.0.root()
        }
        fn is_clean(&mut self) -> crate::vcs::Result<bool> {
            Ok(true)
        }
        fn add(&mut self, paths: &[RepoPath]) -> crate::vcs::Result<String> {
            self.0.add(paths)
        }
        fn remove(&mut self, paths: &[RepoPath]) -> crate::vcs::Result<String> {
            self.0.remove(paths)
        }
        fn checkout(&mut self, _paths: &[RepoPath]) -> crate::vcs::Result<String> {
            Err(VcsError::CommandFailed {
                command: "cm checkout".to_string(),
                code: 1,
                stderr: "locked".to_string(),
            })
        }
        fn move_paths(&mut self, pairs: &[(RepoPath, RepoPath)]) -> crate::vcs::Result<String> {
            self.0.move_paths(pairs)
        }
    }

    #[derive(Default)]
    struct Recorder {
        batches: Vec<usize>,
        steps: Vec<String>,
    }

    impl JobListener for Recorder {
        fn start_batch(&mut self, _kind: OpKind, ops: &[Operation]) {
            self.batches.push(ops.len());
        }
        fn start_step(&mut self, desc: &str) {
            self.steps.push(desc.to_string());
        }
    }

    #[test]
    fn dirs_to_create_stop_at_existing_or_scheduled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        let dirs = find_dirs_to_create(
            dir.path(),
            &[
                RepoPath::new("a/b/c/x.txt"),
                RepoPath::new("a/b/y.txt"),
                RepoPath::new("d/z.txt"),
                RepoPath::new("top.txt"),
            ],
        );
        assert_eq!(
            dirs,
            vec![RepoPath::new("a/b"), RepoPath::new("a/b/c"), RepoPath::new("d")]
        );
    }

    #[test]
    fn applied_move_becomes_modify() {
        let dest = tempfile::tempdir().unwrap();
        write(dest.path(), "new/name.txt", "x");

        let changes = classify(["r100\told/name.txt\tnew/name.txt", "m\tother.txt"]).unwrap();
        let jobs = build_jobs(changes, &DirTree::new(dest.path()));

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind(), OpKind::Modify);
        assert_eq!(paths(&jobs[0]), vec!["Modify new/name.txt", "Modify other.txt"]);
    }

    #[test]
    fn trim_and_remove_respect_cursor() {
        let mut job = Job::new(OpKind::Add);
        let first = job.push(Change::Add(RepoPath::new("a")));
        let second = job.push(Change::Add(RepoPath::new("b")));
        job.push(Change::Add(RepoPath::new("c")));
        job.processed_count = 1;

        assert!(!job.remove(first));
        assert!(job.remove(second));
        assert_eq!(job.len(), 2);

        job.trim_trailing(0);
        assert_eq!(job.len(), 1);
    }

    #[test]
    fn add_job_creates_dirs_and_copies() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write(source.path(), "a/b/new.txt", "new");
        write(source.path(), "a/other.txt", "other");

        let mut job = Job::new(OpKind::Add);
        job.push(Change::Add(RepoPath::new("a/b/new.txt")));
        job.push(Change::Add(RepoPath::new("a/other.txt")));

        let source_tree = DirTree::new(source.path());
        let mut vcs = DirectoryVcs::new(dest.path());
        let mut ctx = JobContext {
            source: &source_tree,
            vcs: &mut vcs,
            pretend: false,
        };
        let mut recorder = Recorder::default();
        let failures = job
            .process(&mut ctx, 1, None, &mut recorder, &mut AbortOnError)
            .unwrap();

        assert!(failures.is_empty());
        assert_eq!(job.processed_count(), 2);
        assert_eq!(recorder.batches, vec![1, 1]);
        assert_eq!(std::fs::read_to_string(dest.path().join("a/b/new.txt")).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(dest.path().join("a/other.txt")).unwrap(), "other");
    }

    #[test]
    fn max_count_limits_processing() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            write(source.path(), name, name);
        }
        let mut job = Job::new(OpKind::Add);
        for name in ["a.txt", "b.txt", "c.txt"] {
            job.push(Change::Add(RepoPath::new(name)));
        }

        let source_tree = DirTree::new(source.path());
        let mut vcs = DirectoryVcs::new(dest.path());
        let mut ctx = JobContext {
            source: &source_tree,
            vcs: &mut vcs,
            pretend: false,
        };
        job.process(&mut ctx, 10, Some(2), &mut NoopListener, &mut AbortOnError)
            .unwrap();
        assert_eq!(job.processed_count(), 2);
        assert_eq!(job.unprocessed().len(), 1);
        assert!(!dest.path().join("c.txt").exists());
    }

    #[test]
    fn delete_job_prunes_empty_ancestors() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write(dest.path(), "a/b/c/gone.txt", "x");
        write(dest.path(), "a/keep.txt", "x");

        let mut job = Job::new(OpKind::Delete);
        job.push(Change::Delete(RepoPath::new("a/b/c/gone.txt")));

        let source_tree = DirTree::new(source.path());
        let mut vcs = DirectoryVcs::new(dest.path());
        let mut ctx = JobContext {
            source: &source_tree,
            vcs: &mut vcs,
            pretend: false,
        };
        job.process(&mut ctx, 10, None, &mut NoopListener, &mut AbortOnError)
            .unwrap();

        assert!(!dest.path().join("a/b").exists());
        assert!(dest.path().join("a/keep.txt").is_file());
    }

    #[test]
    fn move_job_renames_and_cleans_up() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write(source.path(), "new/dir/name.txt", "v2");
        write(dest.path(), "old/name.txt", "v1");

        let mut job = Job::new(OpKind::Move);
        job.push(Change::Move {
            source: RepoPath::new("old/name.txt"),
            target: RepoPath::new("new/dir/name.txt"),
        });

        let source_tree = DirTree::new(source.path());
        let mut vcs = DirectoryVcs::new(dest.path());
        let mut ctx = JobContext {
            source: &source_tree,
            vcs: &mut vcs,
            pretend: false,
        };
        let mut recorder = Recorder::default();
        job.process(&mut ctx, 10, None, &mut recorder, &mut AbortOnError)
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.path().join("new/dir/name.txt")).unwrap(),
            "v2"
        );
        assert!(!dest.path().join("old").exists());
        assert!(recorder.steps.contains(&"Move files".to_string()));
    }

    fn mv(source: &str, target: &str) -> Operation {
        Operation::new(Change::Move {
            source: RepoPath::new(source),
            target: RepoPath::new(target),
        })
    }

    fn pair(from: &str, to: &str) -> (RepoPath, RepoPath) {
        (RepoPath::new(from), RepoPath::new(to))
    }

    #[test]
    fn parent_case_changes_are_deduplicated_parents_first() {
        let dest = tempfile::tempdir().unwrap();
        write(dest.path(), "Engine/Source/ThirdParty/lib.h", "h");
        write(dest.path(), "Engine/Source/main.cpp", "m");

        let ops = vec![
            mv("Engine/Source/ThirdParty/lib.h", "engine/source/ThirdParty/lib.h"),
            mv("Engine/Source/main.cpp", "engine/source/main.cpp"),
        ];
        let renames = find_parent_dir_case_changes(dest.path(), &ops).unwrap();

        assert_eq!(
            renames,
            vec![pair("Engine", "engine"), pair("engine/Source", "engine/source")]
        );
    }

    #[test]
    fn moves_covered_by_a_directory_rename_are_not_pending() {
        let ops = vec![
            mv("Engine/Source/main.cpp", "engine/source/main.cpp"),
            mv("Engine/Source/Old.cpp", "engine/source/New.cpp"),
        ];
        let renames = vec![pair("Engine", "engine"), pair("engine/Source", "engine/source")];

        assert_eq!(
            pending_moves(&ops, &renames),
            vec![pair("engine/source/Old.cpp", "engine/source/New.cpp")]
        );
        assert_eq!(pending_moves(&ops, &[]).len(), 2);
    }

    #[test]
    fn case_only_move_counts_as_applied_by_its_spelling() {
        let dest = tempfile::tempdir().unwrap();
        write(dest.path(), "src/readme.md", "r");
        let destination = DirTree::new(dest.path());

        let done = (RepoPath::new("src/README.md"), RepoPath::new("src/readme.md"));
        assert!(move_applied(&done.0, &done.1, &destination));

        let pending = (RepoPath::new("src/readme.md"), RepoPath::new("src/Readme.md"));
        assert!(!move_applied(&pending.0, &pending.1, &destination));
    }

    #[test]
    fn case_only_move_is_absorbed_once_applied() {
        let dest = tempfile::tempdir().unwrap();
        write(dest.path(), "Lib/util.c", "u");
        let destination = DirTree::new(dest.path());

        let mut changes = classify(["r100\tLib/Util.c\tLib/util.c"]).unwrap();
        let absorbed = reconcile_applied_moves(&mut changes, &destination);
        assert_eq!(absorbed.len(), 1);
        assert!(changes.moves.is_empty());
        assert_eq!(changes.modifications, vec![Change::Modify(RepoPath::new("Lib/util.c"))]);

        let mut changes = classify(["r100\tLib/util.c\tLib/UTIL.c"]).unwrap();
        assert!(reconcile_applied_moves(&mut changes, &destination).is_empty());
        assert_eq!(changes.moves.len(), 1);
    }

    #[test]
    fn case_only_parent_change_leaves_single_directory() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write(source.path(), "engine/Source/a.txt", "a");
        write(dest.path(), "Engine/Source/a.txt", "a");

        let mut job = Job::new(OpKind::Move);
        job.push(Change::Move {
            source: RepoPath::new("Engine/Source/a.txt"),
            target: RepoPath::new("engine/Source/a.txt"),
        });

        let source_tree = DirTree::new(source.path());
        let mut vcs = DirectoryVcs::new(dest.path());
        let mut ctx = JobContext {
            source: &source_tree,
            vcs: &mut vcs,
            pretend: false,
        };
        let failures = job
            .process(&mut ctx, 10, None, &mut NoopListener, &mut AbortOnError)
            .unwrap();

        assert!(failures.is_empty());
        assert!(dest.path().join("engine/Source/a.txt").is_file());
        let names: Vec<String> = std::fs::read_dir(dest.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["engine".to_string()]);
    }

    #[test]
    fn failed_step_is_recorded_and_cursor_advances() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write(source.path(), "a.txt", "new");
        write(dest.path(), "a.txt", "old");

        let mut job = Job::new(OpKind::Modify);
        job.push(Change::Modify(RepoPath::new("a.txt")));

        let source_tree = DirTree::new(source.path());
        let mut vcs = BrokenCheckout(DirectoryVcs::new(dest.path()));
        let mut ctx = JobContext {
            source: &source_tree,
            vcs: &mut vcs,
            pretend: false,
        };
        let failures = job
            .process(&mut ctx, 10, None, &mut NoopListener, &mut ContinueOnError)
            .unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step, "Checkout files");
        assert_eq!(failures[0].operations, vec!["Modify a.txt".to_string()]);
        assert_eq!(job.processed_count(), 1);
        // Remaining steps of the batch are still attempted.
        assert_eq!(std::fs::read_to_string(dest.path().join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn abort_stops_after_failed_batch() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt"] {
            write(source.path(), name, "new");
            write(dest.path(), name, "old");
        }

        let mut job = Job::new(OpKind::Modify);
        job.push(Change::Modify(RepoPath::new("a.txt")));
        job.push(Change::Modify(RepoPath::new("b.txt")));

        let source_tree = DirTree::new(source.path());
        let mut vcs = BrokenCheckout(DirectoryVcs::new(dest.path()));
        let mut ctx = JobContext {
            source: &source_tree,
            vcs: &mut vcs,
            pretend: false,
        };
        let aborted = job
            .process(&mut ctx, 1, None, &mut NoopListener, &mut AbortOnError)
            .unwrap_err();

        assert_eq!(aborted.failures.len(), 1);
        assert_eq!(job.processed_count(), 1);
        assert_eq!(std::fs::read_to_string(dest.path().join("b.txt")).unwrap(), "old");
    }
}
