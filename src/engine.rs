use anyhow::{Context, Result};
use std::io::IsTerminal;
use tracing::{error, info, warn};

use crate::classify::{self, ClassifiedChanges};
use crate::cli::{ImportArgs, PlanArgs, ProbeArgs};
use crate::config::ImportConfig;
use crate::events::Event;
use crate::exit_codes::exit;
use crate::job::{self, Aborted, ExecutionFailure, Job, JobContext, JobListener};
use crate::model::{JobReport, OperationReport, PlanReport};
use crate::policy::{AbortOnError, ContinueOnError, Decision, FailurePolicy, Interactive};
use crate::progress::ProgressListener;
use crate::reporter::Reporter;
use crate::resolve::{self, CaseSensitivity};
use crate::tree::{self, DirTree, FileTree};
use crate::validate;

/// How a run of [`BatchExecutor::run`] ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        failures: Vec<ExecutionFailure>,
        skipped: usize,
    },
    Aborted {
        failures: Vec<ExecutionFailure>,
        skipped: usize,
    },
}

impl RunOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, RunOutcome::Aborted { .. })
    }

    pub fn failures(&self) -> &[ExecutionFailure] {
        match self {
            RunOutcome::Completed { failures, .. } | RunOutcome::Aborted { failures, .. } => {
                failures
            }
        }
    }

    /// Invalid operations pruned instead of executed.
    pub fn skipped(&self) -> usize {
        match self {
            RunOutcome::Completed { skipped, .. } | RunOutcome::Aborted { skipped, .. } => *skipped,
        }
    }
}

/// Runs jobs in order, one batch at a time.
///
/// Each batch is validated against the destination right before it runs, so
/// earlier jobs (an Add creating a Move's parent, say) are taken into account.
pub struct BatchExecutor<'a> {
    batch_size: usize,
    listener: &'a mut dyn JobListener,
    policy: &'a mut dyn FailurePolicy,
    failures: Vec<ExecutionFailure>,
    skipped: usize,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(
        batch_size: usize,
        listener: &'a mut dyn JobListener,
        policy: &'a mut dyn FailurePolicy,
    ) -> Self {
        Self {
            batch_size: batch_size.max(1),
            listener,
            policy,
            failures: Vec::new(),
            skipped: 0,
        }
    }

    pub fn run(mut self, jobs: &mut [Job], ctx: &mut JobContext<'_>) -> RunOutcome {
        for job in jobs.iter_mut() {
            if job.is_done() {
                continue;
            }
            self.listener.start_job(job.kind(), job.unprocessed().len());
            let finished = self.run_job(job, ctx);
            self.listener.end_job(job.kind());
            if !finished {
                return RunOutcome::Aborted {
                    failures: self.failures,
                    skipped: self.skipped,
                };
            }
        }
        RunOutcome::Completed {
            failures: self.failures,
            skipped: self.skipped,
        }
    }

    /// Returns false when the policy aborted.
    fn run_job(&mut self, job: &mut Job, ctx: &mut JobContext<'_>) -> bool {
        while !job.is_done() {
            if !self.prune_next_batch(job, ctx) {
                return false;
            }
            if job.is_done() {
                break;
            }
            match job.process(
                ctx,
                self.batch_size,
                Some(self.batch_size),
                &mut *self.listener,
                &mut *self.policy,
            ) {
                Ok(failures) => self.failures.extend(failures),
                Err(Aborted { failures }) => {
                    self.failures.extend(failures);
                    return false;
                }
            }
        }
        true
    }

    /// Remove invalid operations until the next batch is entirely valid.
    fn prune_next_batch(&mut self, job: &mut Job, ctx: &JobContext<'_>) -> bool {
        let destination = ctx.destination();
        loop {
            let invalid = job.find_invalid_in_next(self.batch_size, ctx.source, &destination);
            if invalid.is_empty() {
                return true;
            }
            for (op, validation) in invalid {
                warn!("{op}: {validation}");
                let decision = self.policy.on_invalid_operation(&op, &validation);
                self.listener.operation_invalid(&op, &validation, decision);
                if decision == Decision::Abort {
                    return false;
                }
                job.remove(op.id());
                self.skipped += 1;
            }
        }
    }
}

/// Keep only the first `max_ops` operations across all jobs.
pub fn trim_jobs(jobs: &mut Vec<Job>, max_ops: usize) {
    let mut remaining = max_ops;
    for job in jobs.iter_mut() {
        job.trim_trailing(remaining);
        remaining = remaining.saturating_sub(job.len());
    }
    jobs.retain(|job| !job.is_empty());
}

/// Turn moves the destination already shows into modifies, warning when the
/// moved file's content still differs from the source.
pub fn reconcile_moves(
    changes: &mut ClassifiedChanges,
    source: &dyn FileTree,
    destination: &dyn FileTree,
    reporter: &mut Reporter,
) {
    for change in job::reconcile_applied_moves(changes, destination) {
        let Some(target) = change.target() else {
            continue;
        };
        let content_differs = !tree::same_content(source, destination, target);
        if content_differs {
            warn!("{change} was already applied, but {target} differs from the source");
        } else {
            info!("{change} was already applied");
        }
        reporter.record(Event::MoveAlreadyApplied {
            source: change.path().to_string(),
            target: target.to_string(),
            content_differs,
        });
    }
}

/// Validation of every operation against the current destination.
pub fn plan_report(jobs: &[Job], source: &dyn FileTree, destination: &dyn FileTree) -> PlanReport {
    PlanReport {
        jobs: jobs
            .iter()
            .map(|job| JobReport {
                kind: job.kind(),
                operations: job
                    .unprocessed()
                    .iter()
                    .map(|op| OperationReport::new(op, &validate::validate(op, source, destination)))
                    .collect(),
            })
            .collect(),
    }
}

/// Check the workspace's case sensitivity, warning when it is insensitive.
///
/// The check writes a marker file, so runs that promise to change nothing skip it.
fn check_workspace_case(config: &ImportConfig) -> Option<CaseSensitivity> {
    if config.pretend || config.validate_only {
        return None;
    }
    match resolve::probe_case_sensitivity(&config.workspace) {
        Ok(sensitivity) => {
            if sensitivity == CaseSensitivity::Insensitive {
                warn!("workspace is case-insensitive; directory case changes are renamed explicitly");
            }
            Some(sensitivity)
        }
        Err(err) => {
            warn!("could not probe case sensitivity: {err}");
            None
        }
    }
}

/// Read, classify and reconcile the diff. `None` when the diff is malformed.
fn load_jobs(
    config: &ImportConfig,
    source: &DirTree,
    destination: &DirTree,
    reporter: &mut Reporter,
) -> Result<Option<Vec<Job>>> {
    let lines = config.diff_provider()?.diff_lines()?;
    let mut changes = match classify::classify(&lines) {
        Ok(changes) => changes,
        Err(err) => {
            error!("{err}");
            return Ok(None);
        }
    };
    info!(
        "{} change(s): {} add, {} delete, {} modify, {} move",
        changes.len(),
        changes.adds.len(),
        changes.deletes.len(),
        changes.modifications.len(),
        changes.moves.len()
    );

    reconcile_moves(&mut changes, source, destination, reporter);
    let mut jobs = job::build_jobs(changes, destination);
    if let Some(max_ops) = config.max_ops {
        trim_jobs(&mut jobs, max_ops);
    }
    Ok(Some(jobs))
}

fn print_plan(report: &PlanReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for job in &report.jobs {
        println!("{} ({})", job.kind, job.operations.len());
        for op in &job.operations {
            let path = match &op.target {
                Some(target) => format!("{} -> {}", op.path, target),
                None => op.path.to_string(),
            };
            match &op.detail {
                Some(detail) => println!("  {path}  [skip: {detail}]"),
                None => println!("  {path}"),
            }
        }
    }
    Ok(())
}

pub fn import(args: ImportArgs) -> Result<i32> {
    let config = ImportConfig::from_import_args(&args)?;
    let mut reporter = Reporter::new(config.json);
    let mut vcs = config.version_control();

    if !config.pretend && !config.validate_only {
        let clean = vcs.is_clean().context("failed to query workspace status")?;
        if !clean {
            error!(
                "workspace {} has pending changes; commit or revert them first",
                config.workspace.display()
            );
            return Ok(exit::PRECONDITION_FAILURE);
        }
    }
    check_workspace_case(&config);

    let source = DirTree::new(&config.source);
    let destination = DirTree::new(&config.workspace);
    let Some(mut jobs) = load_jobs(&config, &source, &destination, &mut reporter)? else {
        return Ok(exit::PRECONDITION_FAILURE);
    };

    if config.validate_only {
        let report = plan_report(&jobs, &source, &destination);
        let invalid = report
            .jobs
            .iter()
            .flat_map(|job| &job.operations)
            .filter(|op| !op.valid)
            .count();
        print_plan(&report, config.json)?;
        return Ok(if invalid == 0 {
            exit::SUCCESS
        } else {
            exit::COMPLETED_WITH_FAILURES
        });
    }

    let run_id = uuid::Uuid::new_v4();
    reporter.record(Event::RunStarted {
        run_id,
        ts: chrono::Utc::now(),
        source: config.source.clone(),
        workspace: config.workspace.clone(),
        pretend: config.pretend,
    });

    let mut policy: Box<dyn FailurePolicy> = if config.continue_on_error {
        Box::new(ContinueOnError)
    } else if std::io::stdin().is_terminal() {
        Box::new(Interactive::new())
    } else {
        Box::new(AbortOnError)
    };

    let outcome = {
        let mut listener = ProgressListener::new(&mut reporter);
        let mut ctx = JobContext {
            source: &source,
            vcs: vcs.as_mut(),
            pretend: config.pretend,
        };
        BatchExecutor::new(config.batch_size, &mut listener, policy.as_mut()).run(&mut jobs, &mut ctx)
    };

    // Skipped operations, failed steps and the invalid operation an abort stopped at.
    let failures = reporter.failures().len();
    let ts = chrono::Utc::now();
    reporter.record(if outcome.is_aborted() {
        Event::RunAborted { run_id, ts, failures }
    } else {
        Event::RunCompleted { run_id, ts, failures }
    });
    if !config.json {
        eprintln!("{}", reporter.summary());
    }

    Ok(if outcome.is_aborted() {
        exit::ABORTED
    } else if failures > 0 {
        exit::COMPLETED_WITH_FAILURES
    } else {
        exit::SUCCESS
    })
}

pub fn plan(args: PlanArgs) -> Result<i32> {
    let config = ImportConfig::from_plan_args(&args)?;
    // Events would interleave with the report on stdout.
    let mut reporter = Reporter::new(false);

    let source = DirTree::new(&config.source);
    let destination = DirTree::new(&config.workspace);
    let Some(jobs) = load_jobs(&config, &source, &destination, &mut reporter)? else {
        return Ok(exit::PRECONDITION_FAILURE);
    };
    print_plan(&plan_report(&jobs, &source, &destination), config.json)?;
    Ok(exit::SUCCESS)
}

pub fn probe(args: ProbeArgs) -> Result<i32> {
    let sensitivity = resolve::probe_case_sensitivity(&args.dir)
        .with_context(|| format!("failed to probe {}", args.dir.display()))?;
    match sensitivity {
        CaseSensitivity::Sensitive => println!("case-sensitive"),
        CaseSensitivity::Insensitive => println!("case-insensitive"),
    }
    Ok(exit::SUCCESS)
}
