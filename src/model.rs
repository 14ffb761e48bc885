use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::path::RepoPath;

/// Kind of change, and of the job that applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Add,
    Delete,
    Modify,
    Move,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Add => "Add",
            OpKind::Delete => "Delete",
            OpKind::Modify => "Modify",
            OpKind::Move => "Move",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single file-level event between two snapshots of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Add(RepoPath),
    Modify(RepoPath),
    Delete(RepoPath),
    Move { source: RepoPath, target: RepoPath },
}

impl Change {
    /// The path the change is keyed by; the source side of a move.
    pub fn path(&self) -> &RepoPath {
        match self {
            Change::Add(path) | Change::Modify(path) | Change::Delete(path) => path,
            Change::Move { source, .. } => source,
        }
    }

    pub fn target(&self) -> Option<&RepoPath> {
        match self {
            Change::Move { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Change::Add(_) => OpKind::Add,
            Change::Modify(_) => OpKind::Modify,
            Change::Delete(_) => OpKind::Delete,
            Change::Move { .. } => OpKind::Move,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Move { source, target } => {
                let common = source.common_dir(target);
                if common.is_root() {
                    write!(f, "Move {source} to {target}")
                } else {
                    write!(
                        f,
                        "Move {} to {} in {}",
                        source.strip_dir(&common),
                        target.strip_dir(&common),
                        common
                    )
                }
            }
            other => write!(f, "{} {}", other.kind(), other.path()),
        }
    }
}

/// Identity of an operation. Two operations on the same path are still distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(uuid::Uuid);

impl OpId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Executable unit derived from a [`Change`], owned by one job.
#[derive(Debug, Clone)]
pub struct Operation {
    id: OpId,
    change: Change,
}

impl Operation {
    pub fn new(change: Change) -> Self {
        Self {
            id: OpId::new(),
            change,
        }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn change(&self) -> &Change {
        &self.change
    }

    pub fn kind(&self) -> OpKind {
        self.change.kind()
    }

    pub fn path(&self) -> &RepoPath {
        self.change.path()
    }

    pub fn target(&self) -> Option<&RepoPath> {
        self.change.target()
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Operation {}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.change, f)
    }
}

/// Which of the two trees a path was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tree {
    Source,
    Destination,
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::Source => f.write_str("source"),
            Tree::Destination => f.write_str("destination"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    AlreadyExistsAtDestination,
    MissingAtSource,
    MissingAtDestination,
    SelfMove,
    /// A delete of a file the source still has.
    ExistsAtSource,
    /// A modify whose destination content already equals the source.
    UpToDate,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::AlreadyExistsAtDestination => "already exists",
            InvalidReason::MissingAtSource | InvalidReason::MissingAtDestination => "does not exist",
            InvalidReason::SelfMove => "is moved onto itself",
            InvalidReason::ExistsAtSource => "still exists",
            InvalidReason::UpToDate => "is already up to date",
        };
        f.write_str(text)
    }
}

/// Verdict on whether an operation is currently safe to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpValidation {
    Valid,
    Invalid {
        reason: InvalidReason,
        path: RepoPath,
        tree: Tree,
    },
}

impl OpValidation {
    pub fn invalid(reason: InvalidReason, path: &RepoPath, tree: Tree) -> Self {
        OpValidation::Invalid {
            reason,
            path: path.clone(),
            tree,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, OpValidation::Valid)
    }

    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            OpValidation::Valid => None,
            OpValidation::Invalid { reason, .. } => Some(*reason),
        }
    }
}

impl fmt::Display for OpValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpValidation::Valid => f.write_str("valid"),
            OpValidation::Invalid { reason, path, tree } => {
                write!(f, "{path} {reason} in {tree}")
            }
        }
    }
}

/// Serialisable view of the planned jobs, printed by `vendorsync plan`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanReport {
    /// Jobs in execution order.
    pub jobs: Vec<JobReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobReport {
    pub kind: OpKind,
    pub operations: Vec<OperationReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperationReport {
    pub path: RepoPath,
    /// Target path of a move.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RepoPath>,
    pub valid: bool,
    /// Why the operation would be skipped, when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl OperationReport {
    pub fn new(op: &Operation, validation: &OpValidation) -> Self {
        Self {
            path: op.path().clone(),
            target: op.target().cloned(),
            valid: validation.is_valid(),
            reason: validation.reason(),
            detail: (!validation.is_valid()).then(|| validation.to_string()),
        }
    }
}

/// Generate JSON Schema for the plan report.
pub fn generate_schema() -> Result<String> {
    let schema = schemars::schema_for!(PlanReport);
    Ok(serde_json::to_string_pretty(&schema)?)
}
