//! Raw diff parsing and grouping into typed changes.
//!
//! Diff lines have the shape `<mode>\t<path>[\t<target>]` as printed by
//! `git diff --name-status`. Changes are grouped by case-folded file name
//! so that a rename reported as a delete followed by an add collapses into
//! a single [`Change::Move`].

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::model::Change;
use crate::path::RepoPath;

static RENAME_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^r[0-9]*$").expect("invalid rename mode regex"));
static COPY_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^c[0-9]*$").expect("invalid copy mode regex"));

/// A raw diff line that could not be understood. Fatal for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("diff line {line}: {message} in {content:?}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub content: String,
    pub message: String,
}

/// Changes split by kind, each list sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedChanges {
    pub modifications: Vec<Change>,
    pub adds: Vec<Change>,
    pub deletes: Vec<Change>,
    /// Sorted by source path.
    pub moves: Vec<Change>,
}

impl ClassifiedChanges {
    pub fn len(&self) -> usize {
        self.modifications.len() + self.adds.len() + self.deletes.len() + self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn file(&mut self, change: Change) {
        match change {
            Change::Add(_) => self.adds.push(change),
            Change::Modify(_) => self.modifications.push(change),
            Change::Delete(_) => self.deletes.push(change),
            Change::Move { .. } => self.moves.push(change),
        }
    }

    pub(crate) fn sort(&mut self) {
        for list in [
            &mut self.modifications,
            &mut self.adds,
            &mut self.deletes,
            &mut self.moves,
        ] {
            list.sort_by(|a, b| a.path().cmp(b.path()));
        }
    }
}

/// Parse one diff line. Blank lines yield `None`.
pub fn parse_line(number: usize, line: &str) -> Result<Option<Change>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let error = |message: String| ParseError {
        line: number,
        content: line.to_string(),
        message,
    };
    let parts: Vec<&str> = line.split('\t').collect();
    let mode = parts[0].trim().to_lowercase();
    let field = |index: usize| -> Result<RepoPath, ParseError> {
        parts
            .get(index)
            .map(|p| RepoPath::new(p))
            .filter(|p| !p.is_root())
            .ok_or_else(|| error(format!("missing path field {index} for mode {mode:?}")))
    };

    let change = match mode.as_str() {
        "a" => Change::Add(field(1)?),
        "m" | "t" => Change::Modify(field(1)?),
        "d" => Change::Delete(field(1)?),
        m if RENAME_MODE.is_match(m) => Change::Move {
            source: field(1)?,
            target: field(2)?,
        },
        m if COPY_MODE.is_match(m) => Change::Add(field(2)?),
        _ => return Err(error(format!("unrecognized change mode {mode:?}"))),
    };
    Ok(Some(change))
}

/// Parse every line, failing on the first one that is malformed.
pub fn parse_diff<I, S>(lines: I) -> Result<Vec<Change>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut changes = Vec::new();
    for (index, line) in lines.into_iter().enumerate() {
        if let Some(change) = parse_line(index + 1, line.as_ref())? {
            changes.push(change);
        }
    }
    Ok(changes)
}

/// Parse raw diff lines and classify them.
pub fn classify<I, S>(lines: I) -> Result<ClassifiedChanges, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(group_changes(parse_diff(lines)?))
}

/// Group changes by case-folded file name, collapsing adjacent
/// delete + add pairs in a group into moves.
pub fn group_changes(changes: Vec<Change>) -> ClassifiedChanges {
    let mut per_file: BTreeMap<String, Vec<Option<Change>>> = BTreeMap::new();
    for change in changes {
        per_file
            .entry(change.path().file_name().to_lowercase())
            .or_default()
            .push(Some(change));
    }

    let mut classified = ClassifiedChanges::default();
    for (name, mut slots) in per_file {
        if slots.len() > 1 {
            debug!(file = %name, changes = slots.len(), "grouped changes");
            for i in 0..slots.len() - 1 {
                let collapsed = match (&slots[i], &slots[i + 1]) {
                    (Some(Change::Delete(deleted)), Some(Change::Add(added))) => Some(Change::Move {
                        source: deleted.clone(),
                        target: added.clone(),
                    }),
                    _ => None,
                };
                if let Some(change) = collapsed {
                    debug!(%change, "replacing delete + add with move");
                    slots[i] = Some(change);
                    slots[i + 1] = None;
                }
            }
        }
        for change in slots.into_iter().flatten() {
            classified.file(change);
        }
    }

    classified.sort();
    classified
}
