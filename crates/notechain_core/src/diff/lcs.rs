//! Line-level LCS differ.
//!
//! # Responsibility
//! - Compute a minimal, coalesced line edit script between two line lists.
//! - Replay scripts against an old line list.
//!
//! # Invariants
//! - Output is deterministic: when LCS scores tie, insert is emitted before
//!   delete during backtracking.
//! - No two adjacent ops share a tag.
//! - Replaying `diff_lines(a, b)` against `a` yields exactly `b`.

use crate::text::normalize::NormalizedText;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Edit operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    Equal,
    Insert,
    Delete,
}

impl DiffTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Insert => "insert",
            Self::Delete => "delete",
        }
    }
}

/// One run of lines sharing a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOp {
    /// Serialized as `type` to match the JSON wire shape.
    #[serde(rename = "type")]
    pub tag: DiffTag,
    pub lines: Vec<String>,
}

/// Ordered edit script.
pub type EditScript = Vec<DiffOp>;

/// Line counts per tag in one script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStats {
    pub unchanged: usize,
    pub inserted: usize,
    pub deleted: usize,
}

impl ScriptStats {
    /// Tallies a script.
    pub fn of(script: &[DiffOp]) -> Self {
        let mut stats = Self::default();
        for op in script {
            match op.tag {
                DiffTag::Equal => stats.unchanged += op.lines.len(),
                DiffTag::Insert => stats.inserted += op.lines.len(),
                DiffTag::Delete => stats.deleted += op.lines.len(),
            }
        }
        stats
    }

    /// Returns whether the script changes anything.
    pub fn has_changes(&self) -> bool {
        self.inserted > 0 || self.deleted > 0
    }
}

/// Replay failure: the script does not belong to the given old lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// An equal/delete line does not match the old line at `old_index`.
    LineMismatch {
        old_index: usize,
        expected: String,
        found: Option<String>,
    },
    /// The script ended before consuming every old line.
    UnconsumedLines { remaining: usize },
}

impl Display for ApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LineMismatch {
                old_index,
                found: Some(_),
                ..
            } => write!(f, "script line does not match old line {old_index}"),
            Self::LineMismatch {
                old_index,
                found: None,
                ..
            } => write!(f, "script references old line {old_index} past the end"),
            Self::UnconsumedLines { remaining } => {
                write!(f, "script leaves {remaining} old line(s) unconsumed")
            }
        }
    }
}

impl Error for ApplyError {}

/// Computes the coalesced line edit script from `old_lines` to `new_lines`.
///
/// Wagner-Fischer LCS table, `O(n*m)` time and memory in line counts, one
/// `u32` per cell. Callers bound `n * m` before calling.
pub fn diff_lines<A, B>(old_lines: &[A], new_lines: &[B]) -> EditScript
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let n = old_lines.len();
    let m = new_lines.len();
    let width = m + 1;
    let same = |i: usize, j: usize| old_lines[i].as_ref() == new_lines[j].as_ref();

    // table[i * width + j] = LCS length of old[..i] and new[..j].
    let mut table = vec![0u32; (n + 1) * width];
    for i in 1..=n {
        for j in 1..=m {
            table[i * width + j] = if same(i - 1, j - 1) {
                table[(i - 1) * width + (j - 1)] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + (j - 1)])
            };
        }
    }

    let mut steps: Vec<(DiffTag, &str)> = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && same(i - 1, j - 1) {
            steps.push((DiffTag::Equal, old_lines[i - 1].as_ref()));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i * width + (j - 1)] >= table[(i - 1) * width + j]) {
            steps.push((DiffTag::Insert, new_lines[j - 1].as_ref()));
            j -= 1;
        } else {
            steps.push((DiffTag::Delete, old_lines[i - 1].as_ref()));
            i -= 1;
        }
    }
    steps.reverse();

    coalesce(steps)
}

/// Diffs the line views of two normalized texts.
pub fn diff_texts(old: &NormalizedText, new: &NormalizedText) -> EditScript {
    diff_lines(&old.lines(), &new.lines())
}

/// Replays `script` against `old_lines`, returning the new line list.
///
/// Equal and delete lines are checked against the old sequence, so a script
/// recorded for different content is rejected instead of producing garbage.
pub fn apply_script<S: AsRef<str>>(
    old_lines: &[S],
    script: &[DiffOp],
) -> Result<Vec<String>, ApplyError> {
    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(old_lines.len());

    for op in script {
        for line in &op.lines {
            match op.tag {
                DiffTag::Insert => out.push(line.clone()),
                DiffTag::Equal | DiffTag::Delete => {
                    let found = old_lines.get(cursor).map(|value| value.as_ref());
                    if found != Some(line.as_str()) {
                        return Err(ApplyError::LineMismatch {
                            old_index: cursor,
                            expected: line.clone(),
                            found: found.map(str::to_string),
                        });
                    }
                    if op.tag == DiffTag::Equal {
                        out.push(line.clone());
                    }
                    cursor += 1;
                }
            }
        }
    }

    if cursor != old_lines.len() {
        return Err(ApplyError::UnconsumedLines {
            remaining: old_lines.len() - cursor,
        });
    }

    Ok(out)
}

fn coalesce(steps: Vec<(DiffTag, &str)>) -> EditScript {
    let mut ops: EditScript = Vec::new();
    for (tag, line) in steps {
        match ops.last_mut() {
            Some(last) if last.tag == tag => last.lines.push(line.to_string()),
            _ => ops.push(DiffOp {
                tag,
                lines: vec![line.to_string()],
            }),
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::{apply_script, diff_lines, ApplyError, DiffOp, DiffTag, ScriptStats};

    fn op(tag: DiffTag, lines: &[&str]) -> DiffOp {
        DiffOp {
            tag,
            lines: lines.iter().map(|line| line.to_string()).collect(),
        }
    }

    #[test]
    fn replaced_middle_line_emits_delete_then_insert() {
        let script = diff_lines(&["a", "b", "c"], &["a", "x", "c"]);
        assert_eq!(
            script,
            vec![
                op(DiffTag::Equal, &["a"]),
                op(DiffTag::Delete, &["b"]),
                op(DiffTag::Insert, &["x"]),
                op(DiffTag::Equal, &["c"]),
            ]
        );
    }

    #[test]
    fn empty_old_is_single_insert() {
        let empty: [&str; 0] = [];
        assert_eq!(
            diff_lines(&empty, &["a", "b"]),
            vec![op(DiffTag::Insert, &["a", "b"])]
        );
    }

    #[test]
    fn empty_new_is_single_delete() {
        let empty: [&str; 0] = [];
        assert_eq!(
            diff_lines(&["a", "b"], &empty),
            vec![op(DiffTag::Delete, &["a", "b"])]
        );
    }

    #[test]
    fn both_empty_is_no_ops() {
        let empty: [&str; 0] = [];
        assert!(diff_lines(&empty, &empty).is_empty());
    }

    #[test]
    fn identical_input_is_one_equal_run() {
        assert_eq!(
            diff_lines(&["a", "b"], &["a", "b"]),
            vec![op(DiffTag::Equal, &["a", "b"])]
        );
    }

    #[test]
    fn tie_break_prefers_insert_during_backtrack() {
        // Swapped lines tie on LCS; backtracking takes the insert branch
        // first, which lands the delete ahead of the insert after reversal.
        let script = diff_lines(&["a", "b"], &["b", "a"]);
        assert_eq!(
            script,
            vec![
                op(DiffTag::Delete, &["a"]),
                op(DiffTag::Equal, &["b"]),
                op(DiffTag::Insert, &["a"]),
            ]
        );
    }

    #[test]
    fn apply_rejects_script_for_other_content() {
        let script = diff_lines(&["a", "b"], &["a", "c"]);
        let err = apply_script(&["a", "z"], &script).unwrap_err();
        assert!(matches!(err, ApplyError::LineMismatch { old_index: 1, .. }));

        let err = apply_script(&["a", "b", "tail"], &script).unwrap_err();
        assert_eq!(err, ApplyError::UnconsumedLines { remaining: 1 });
    }

    #[test]
    fn stats_count_lines_per_tag() {
        let stats = ScriptStats::of(&diff_lines(&["a", "b", "c"], &["a", "x", "y"]));
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.deleted, 2);
        assert!(stats.has_changes());
    }
}
