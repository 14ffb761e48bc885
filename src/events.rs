use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::{InvalidReason, OpKind};

/// Structured event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunStarted {
        run_id: uuid::Uuid,
        ts: DateTime<Utc>,
        source: PathBuf,
        workspace: PathBuf,
        pretend: bool,
    },
    MoveAlreadyApplied {
        source: String,
        target: String,
        content_differs: bool,
    },
    JobStarted {
        kind: OpKind,
        op_count: usize,
    },
    BatchCompleted {
        kind: OpKind,
        op_count: usize,
        processed: usize,
        total: usize,
        remaining_secs: Option<u64>,
    },
    OpInvalid {
        kind: OpKind,
        operation: String,
        reason: InvalidReason,
        detail: String,
        skipped: bool,
    },
    StepFailed {
        kind: OpKind,
        step: String,
        operations: Vec<String>,
        error: String,
    },
    JobCompleted {
        kind: OpKind,
        processed: usize,
    },
    RunCompleted {
        run_id: uuid::Uuid,
        ts: DateTime<Utc>,
        failures: usize,
    },
    RunAborted {
        run_id: uuid::Uuid,
        ts: DateTime<Utc>,
        failures: usize,
    },
}
