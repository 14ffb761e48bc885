use crate::events::Event;

/// Reporter aggregates events and produces human or JSON output.
pub struct Reporter {
    events: Vec<Event>,
    json_mode: bool,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            events: Vec::new(),
            json_mode,
        }
    }

    pub fn json_mode(&self) -> bool {
        self.json_mode
    }

    pub fn record(&mut self, event: Event) {
        if self.json_mode {
            // One JSON object per line on stdout
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Failed steps and invalid operations, one description per entry.
    pub fn failures(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::OpInvalid {
                    operation,
                    detail,
                    skipped,
                    ..
                } => Some(if *skipped {
                    format!("skipped {operation}: {detail}")
                } else {
                    format!("aborted at {operation}: {detail}")
                }),
                Event::StepFailed {
                    kind,
                    step,
                    error,
                    operations,
                } => Some(format!(
                    "{kind} step \"{step}\" failed for {} operation(s): {error}",
                    operations.len()
                )),
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let processed: usize = self
            .events
            .iter()
            .filter_map(|event| match event {
                Event::JobCompleted { processed, .. } => Some(*processed),
                _ => None,
            })
            .sum();
        let aborted = self
            .events
            .iter()
            .any(|event| matches!(event, Event::RunAborted { .. }));

        let failures = self.failures();
        let mut out = format!(
            "{} {processed} operation(s), {} failure(s)",
            if aborted { "Aborted after" } else { "Processed" },
            failures.len()
        );
        for failure in &failures {
            out.push_str("\n  ");
            out.push_str(failure);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InvalidReason, OpKind};

    #[test]
    fn summary_lists_failures() {
        let mut reporter = Reporter::new(false);
        reporter.record(Event::OpInvalid {
            kind: OpKind::Add,
            operation: "Add a.txt".to_string(),
            reason: InvalidReason::MissingAtSource,
            detail: "a.txt does not exist in source".to_string(),
            skipped: true,
        });
        reporter.record(Event::JobCompleted {
            kind: OpKind::Add,
            processed: 3,
        });

        assert_eq!(
            reporter.summary(),
            "Processed 3 operation(s), 1 failure(s)\n  skipped Add a.txt: a.txt does not exist in source"
        );
    }

    #[test]
    fn abort_on_invalid_operation_is_a_failure() {
        let mut reporter = Reporter::new(false);
        reporter.record(Event::OpInvalid {
            kind: OpKind::Add,
            operation: "Add missing.txt".to_string(),
            reason: InvalidReason::MissingAtSource,
            detail: "missing.txt does not exist in source".to_string(),
            skipped: false,
        });
        reporter.record(Event::JobCompleted {
            kind: OpKind::Add,
            processed: 0,
        });
        reporter.record(Event::RunAborted {
            run_id: uuid::Uuid::new_v4(),
            ts: chrono::Utc::now(),
            failures: 1,
        });

        assert_eq!(reporter.failures().len(), 1);
        assert_eq!(
            reporter.summary(),
            "Aborted after 0 operation(s), 1 failure(s)\n  aborted at Add missing.txt: missing.txt does not exist in source"
        );
    }
}
