//! Job progress: log lines, structured events and an optional terminal bar.

use std::time::Instant;
use tracing::{debug, info};

use crate::estimate::{JobTimeEstimate, format_duration};
use crate::events::Event;
use crate::job::{ExecutionFailure, JobListener};
use crate::model::{OpKind, OpValidation, Operation};
use crate::policy::Decision;
use crate::reporter::Reporter;

#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};

/// Logs batch progress with remaining-time estimates and forwards
/// milestones to the [`Reporter`].
pub struct ProgressListener<'a> {
    reporter: &'a mut Reporter,
    estimate: JobTimeEstimate,
    total: usize,
    processed: usize,
    batch_started: Option<Instant>,
    step_started: Option<Instant>,
    #[cfg(feature = "cli")]
    bar: Option<ProgressBar>,
}

impl<'a> ProgressListener<'a> {
    pub fn new(reporter: &'a mut Reporter) -> Self {
        Self {
            reporter,
            estimate: JobTimeEstimate::new(),
            total: 0,
            processed: 0,
            batch_started: None,
            step_started: None,
            #[cfg(feature = "cli")]
            bar: None,
        }
    }

    pub fn reporter(&mut self) -> &mut Reporter {
        &mut *self.reporter
    }

    #[cfg(feature = "cli")]
    fn start_bar(&mut self, kind: OpKind, op_count: usize) {
        if self.reporter.json_mode() {
            return;
        }
        let style = ProgressStyle::with_template(
            "  {msg} [{bar:30.cyan/dim}] {pos}/{len} ({eta} remaining)",
        )
        .map(|style| style.progress_chars("━╸─"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(op_count as u64);
        bar.set_style(style);
        bar.set_message(kind.to_string());
        self.bar = Some(bar);
    }

    #[cfg(not(feature = "cli"))]
    fn start_bar(&mut self, _kind: OpKind, _op_count: usize) {}

    #[cfg(feature = "cli")]
    fn advance_bar(&mut self) {
        if let Some(bar) = &self.bar {
            bar.set_position(self.processed as u64);
        }
    }

    #[cfg(not(feature = "cli"))]
    fn advance_bar(&mut self) {}

    #[cfg(feature = "cli")]
    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    #[cfg(not(feature = "cli"))]
    fn finish_bar(&mut self) {}
}

impl JobListener for ProgressListener<'_> {
    fn start_job(&mut self, kind: OpKind, op_count: usize) {
        info!("{kind} job: {op_count} operation(s)");
        self.estimate = JobTimeEstimate::new();
        self.total = op_count;
        self.processed = 0;
        self.reporter.record(Event::JobStarted { kind, op_count });
        self.start_bar(kind, op_count);
    }

    fn end_job(&mut self, kind: OpKind) {
        self.finish_bar();
        info!(
            "{kind} job done: {} operation(s) in {}",
            self.processed,
            format_duration(self.estimate.elapsed())
        );
        self.reporter.record(Event::JobCompleted {
            kind,
            processed: self.processed,
        });
    }

    fn start_batch(&mut self, kind: OpKind, ops: &[Operation]) {
        debug!("{kind} batch of {} operation(s)", ops.len());
        for op in ops {
            debug!("  {op}");
        }
        self.batch_started = Some(Instant::now());
    }

    fn end_batch(&mut self, kind: OpKind, op_count: usize) {
        let elapsed = self.batch_started.take().map(|t| t.elapsed()).unwrap_or_default();
        self.estimate = self.estimate.record(op_count, elapsed);
        self.processed += op_count;

        let remaining = self.estimate.remaining(self.total.saturating_sub(self.processed));
        let percent = if self.total == 0 {
            100
        } else {
            self.processed * 100 / self.total
        };
        info!(
            "{kind}: {}/{} ({percent}%), elapsed {}, remaining {}",
            self.processed,
            self.total,
            format_duration(self.estimate.elapsed()),
            remaining.map(format_duration).unwrap_or_else(|| "unknown".to_string())
        );
        self.reporter.record(Event::BatchCompleted {
            kind,
            op_count,
            processed: self.processed,
            total: self.total,
            remaining_secs: remaining.map(|d| d.as_secs()),
        });
        self.advance_bar();
    }

    fn start_step(&mut self, desc: &str) {
        debug!("{desc}");
        self.step_started = Some(Instant::now());
    }

    fn end_step(&mut self, desc: &str) {
        if let Some(started) = self.step_started.take() {
            debug!("{desc} took {}ms", started.elapsed().as_millis());
        }
    }

    fn operation_invalid(&mut self, op: &Operation, validation: &OpValidation, decision: Decision) {
        if let Some(reason) = validation.reason() {
            self.reporter.record(Event::OpInvalid {
                kind: op.kind(),
                operation: op.to_string(),
                reason,
                detail: validation.to_string(),
                skipped: decision != Decision::Abort,
            });
        }
    }

    fn step_failed(&mut self, failure: &ExecutionFailure) {
        self.reporter.record(Event::StepFailed {
            kind: failure.kind,
            step: failure.step.clone(),
            operations: failure.operations.clone(),
            error: failure.error.clone(),
        });
    }
}
