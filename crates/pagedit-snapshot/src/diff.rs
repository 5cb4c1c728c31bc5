//! Line-level diffing.
//!
//! Builds a full longest-common-subsequence table over the lines of both
//! texts, backtracks it into an edit script and groups the script into
//! context-padded hunks. The table is `O(m * n)` in line counts; callers that
//! need responsiveness must bound input size themselves.

use serde::{Deserialize, Serialize};

/// Number of unchanged lines kept around each change.
pub const CONTEXT_LINES: usize = 3;

/// Kind of a single line operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Equal,
    Add,
    Remove,
}

/// One line of an edit script.
///
/// Line numbers are 1-indexed; `old_line` is absent for additions and
/// `new_line` is absent for removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: LineKind,
    pub line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_line: Option<usize>,
}

impl DiffLine {
    fn equal(line: &str, old_line: usize, new_line: usize) -> Self {
        Self {
            kind: LineKind::Equal,
            line: line.to_string(),
            old_line: Some(old_line),
            new_line: Some(new_line),
        }
    }

    fn add(line: &str, new_line: usize) -> Self {
        Self {
            kind: LineKind::Add,
            line: line.to_string(),
            old_line: None,
            new_line: Some(new_line),
        }
    }

    fn remove(line: &str, old_line: usize) -> Self {
        Self {
            kind: LineKind::Remove,
            line: line.to_string(),
            old_line: Some(old_line),
            new_line: None,
        }
    }

    pub fn is_change(&self) -> bool {
        self.kind != LineKind::Equal
    }
}

/// A contiguous group of changes with surrounding context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub lines: Vec<DiffLine>,
}

/// Added/removed line counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

/// Result of diffing two texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub hunks: Vec<Hunk>,
    pub stats: DiffStats,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}

/// Diff two texts line by line and group the changes into hunks.
pub fn diff_lines(old_text: &str, new_text: &str) -> DiffResult {
    let ops = edit_script(old_text, new_text);
    group_hunks(&ops, CONTEXT_LINES)
}

/// Compute the ungrouped edit script turning `old_text` into `new_text`.
///
/// Both texts are split on `\n`; an empty text is a single empty line.
pub fn edit_script(old_text: &str, new_text: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = old_text.split('\n').collect();
    let new: Vec<&str> = new_text.split('\n').collect();
    let table = lcs_table(&old, &new);

    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (old.len(), new.len());

    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            ops.push(DiffLine::equal(old[i - 1], i, j));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i][j - 1] >= table[i - 1][j]) {
            ops.push(DiffLine::add(new[j - 1], j));
            j -= 1;
        } else {
            ops.push(DiffLine::remove(old[i - 1], i));
            i -= 1;
        }
    }

    ops.reverse();
    ops
}

fn lcs_table(old: &[&str], new: &[&str]) -> Vec<Vec<u32>> {
    let (m, n) = (old.len(), new.len());
    let mut table = vec![vec![0u32; n + 1]; m + 1];

    for i in 1..=m {
        for j in 1..=n {
            table[i][j] = if old[i - 1] == new[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    table
}

/// Group an edit script into hunks padded with `context` equal lines.
///
/// Changes separated by at most `2 * context` equal lines share a hunk.
pub fn group_hunks(ops: &[DiffLine], context: usize) -> DiffResult {
    // next_change[i]: index of the first change at or after i
    let mut next_change = vec![None; ops.len() + 1];
    for idx in (0..ops.len()).rev() {
        next_change[idx] = if ops[idx].is_change() {
            Some(idx)
        } else {
            next_change[idx + 1]
        };
    }

    let mut result = DiffResult::default();
    let mut current: Option<Hunk> = None;
    let mut idx = 0;

    while idx < ops.len() {
        let op = &ops[idx];

        if op.is_change() {
            match op.kind {
                LineKind::Add => result.stats.added += 1,
                LineKind::Remove => result.stats.removed += 1,
                LineKind::Equal => {}
            }

            let hunk = current.get_or_insert_with(|| Hunk {
                lines: ops[idx.saturating_sub(context)..idx].to_vec(),
            });
            hunk.lines.push(op.clone());
        } else if let Some(mut hunk) = current.take() {
            match next_change[idx + 1] {
                Some(next) if next - idx <= context * 2 => {
                    hunk.lines.push(op.clone());
                    current = Some(hunk);
                }
                _ => {
                    let trailing_end = (idx + context).min(ops.len());
                    hunk.lines.extend_from_slice(&ops[idx..trailing_end]);
                    result.hunks.push(hunk);
                    idx = trailing_end;
                    continue;
                }
            }
        }

        idx += 1;
    }

    if let Some(hunk) = current {
        result.hunks.push(hunk);
    }

    result
}

/// Render a diff for display: two-space prefix for context, `+ ` and `- `
/// for changes, and a `---` divider after every hunk.
pub fn format_diff(diff: &DiffResult) -> String {
    let mut lines = Vec::new();

    for hunk in &diff.hunks {
        for op in &hunk.lines {
            let prefix = match op.kind {
                LineKind::Equal => "  ",
                LineKind::Add => "+ ",
                LineKind::Remove => "- ",
            };
            lines.push(format!("{}{}", prefix, op.line));
        }
        lines.push("---".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(hunk: &Hunk) -> Vec<(LineKind, &str)> {
        hunk.lines
            .iter()
            .map(|l| (l.kind, l.line.as_str()))
            .collect()
    }

    fn rebuild(ops: &[DiffLine], keep: LineKind) -> String {
        ops.iter()
            .filter(|op| op.kind == LineKind::Equal || op.kind == keep)
            .map(|op| op.line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn identical_texts_have_no_hunks() {
        for text in ["", "single", "a\nb\nc", "trailing\n", "\n\n\n"] {
            let diff = diff_lines(text, text);
            assert!(diff.hunks.is_empty(), "text {:?}", text);
            assert_eq!(diff.stats, DiffStats::default());
        }
    }

    #[test]
    fn single_line_replacement() {
        let diff = diff_lines("a\nb\nc", "a\nx\nc");
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(
            kinds(&diff.hunks[0]),
            vec![
                (LineKind::Equal, "a"),
                (LineKind::Remove, "b"),
                (LineKind::Add, "x"),
                (LineKind::Equal, "c"),
            ]
        );
        assert_eq!(diff.stats, DiffStats { added: 1, removed: 1 });
    }

    #[test]
    fn edit_script_reconstructs_both_sides() {
        let pairs = [
            ("", "new"),
            ("old", ""),
            ("a\nb\nc\nd", "b\nc\ne\nf\na"),
            ("# Title\n\npara\n", "# Title\n\npara changed\n\nmore\n"),
            ("x\nx\nx", "x\ny\nx"),
        ];

        for (old, new) in pairs {
            let ops = edit_script(old, new);
            assert_eq!(rebuild(&ops, LineKind::Add), new);
            assert_eq!(rebuild(&ops, LineKind::Remove), old);
        }
    }

    #[test]
    fn line_numbers_are_one_indexed() {
        let ops = edit_script("keep\nold", "keep\nnew");
        assert_eq!(ops[0].old_line, Some(1));
        assert_eq!(ops[0].new_line, Some(1));

        let removed = ops.iter().find(|op| op.kind == LineKind::Remove).unwrap();
        assert_eq!(removed.old_line, Some(2));
        assert_eq!(removed.new_line, None);

        let added = ops.iter().find(|op| op.kind == LineKind::Add).unwrap();
        assert_eq!(added.new_line, Some(2));
        assert_eq!(added.old_line, None);
    }

    #[test]
    fn empty_old_text_is_one_empty_line() {
        let diff = diff_lines("", "hello");
        assert_eq!(diff.stats, DiffStats { added: 1, removed: 1 });
    }

    #[test]
    fn distant_changes_form_separate_hunks() {
        let old: Vec<String> = (1..=20).map(|n| format!("line {n}")).collect();
        let mut new = old.clone();
        new[1] = "changed 2".to_string();
        new[17] = "changed 18".to_string();

        let diff = diff_lines(&old.join("\n"), &new.join("\n"));
        assert_eq!(diff.hunks.len(), 2);
        assert_eq!(diff.stats, DiffStats { added: 2, removed: 2 });

        // one leading context line available, three trailing
        let first = &diff.hunks[0];
        assert_eq!(first.lines.first().unwrap().line, "line 1");
        assert_eq!(first.lines.last().unwrap().line, "line 5");
    }

    #[test]
    fn nearby_changes_share_a_hunk() {
        let old: Vec<String> = (1..=20).map(|n| format!("line {n}")).collect();
        let mut new = old.clone();
        new[4] = "changed 5".to_string();
        new[10] = "changed 11".to_string();

        let diff = diff_lines(&old.join("\n"), &new.join("\n"));
        assert_eq!(diff.hunks.len(), 1);

        let hunk = &diff.hunks[0];
        assert_eq!(hunk.lines.first().unwrap().line, "line 2");
        assert_eq!(hunk.lines.last().unwrap().line, "line 14");
    }

    #[test]
    fn format_diff_prefixes_lines() {
        let diff = diff_lines("a\nb\nc", "a\nx\nc");
        assert_eq!(format_diff(&diff), "  a\n- b\n+ x\n  c\n---");
        assert_eq!(format_diff(&DiffResult::default()), "");
    }

    #[test]
    fn diff_line_serializes_with_type_tag() {
        let ops = edit_script("a", "b");
        assert_eq!(ops[0].kind, LineKind::Remove);

        let json = serde_json::to_value(&ops[1]).unwrap();
        assert_eq!(json["type"], "add");
        assert_eq!(json["newLine"], 1);
        assert!(json.get("oldLine").is_none());
    }
}
