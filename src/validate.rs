use crate::model::{Change, InvalidReason, OpValidation, Operation, Tree};
use crate::tree::{self, FileTree};

/// Decide whether `op` is safe to execute against the current trees.
///
/// Never mutates either tree, so it is safe to call repeatedly.
pub fn validate(op: &Operation, source: &dyn FileTree, destination: &dyn FileTree) -> OpValidation {
    validate_change(op.change(), source, destination)
}

pub fn validate_change(
    change: &Change,
    source: &dyn FileTree,
    destination: &dyn FileTree,
) -> OpValidation {
    use InvalidReason::*;

    match change {
        Change::Add(path) => {
            if !source.file_exists(path) {
                OpValidation::invalid(MissingAtSource, path, Tree::Source)
            } else if destination.file_exists(path) {
                OpValidation::invalid(AlreadyExistsAtDestination, path, Tree::Destination)
            } else {
                OpValidation::Valid
            }
        }
        Change::Delete(path) => {
            if !destination.file_exists(path) {
                OpValidation::invalid(MissingAtDestination, path, Tree::Destination)
            } else if source.file_exists(path) {
                OpValidation::invalid(ExistsAtSource, path, Tree::Source)
            } else {
                OpValidation::Valid
            }
        }
        Change::Modify(path) => {
            if !source.file_exists(path) {
                OpValidation::invalid(MissingAtSource, path, Tree::Source)
            } else if !destination.file_exists(path) {
                OpValidation::invalid(MissingAtDestination, path, Tree::Destination)
            } else if tree::same_content(source, destination, path) {
                OpValidation::invalid(UpToDate, path, Tree::Destination)
            } else {
                OpValidation::Valid
            }
        }
        Change::Move {
            source: from,
            target: to,
        } => {
            if from == to {
                OpValidation::invalid(SelfMove, from, Tree::Destination)
            } else if !source.file_exists(to) {
                OpValidation::invalid(MissingAtSource, to, Tree::Source)
            } else if !destination.file_exists(from) {
                OpValidation::invalid(MissingAtDestination, from, Tree::Destination)
            } else if !from.eq_ignore_case(to) && destination.file_exists(to) {
                // A case-only rename finds its own source on a case-insensitive disk.
                OpValidation::invalid(AlreadyExistsAtDestination, to, Tree::Destination)
            } else {
                OpValidation::Valid
            }
        }
    }
}
