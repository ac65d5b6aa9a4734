//! Byte-span edits
//!
//! The syntax engine never rebuilds text from the tree. It collects span
//! replacements against the original source and splices them in one pass.

use anyhow::Result;
use tracing::warn;

use crate::rules::RuleKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Inclusive start byte offset
    pub start: usize,
    /// Exclusive end byte offset (`start == end` is an insertion)
    pub end: usize,
    pub replacement: String,
    pub rule: RuleKind,
}

impl Edit {
    pub fn replace(
        start: usize,
        end: usize,
        replacement: impl Into<String>,
        rule: RuleKind,
    ) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
            rule,
        }
    }

    pub fn insert(at: usize, text: impl Into<String>, rule: RuleKind) -> Self {
        Self::replace(at, at, text, rule)
    }

    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    /// Whether `next` (which starts at or after `self`) cannot be applied
    /// once `self` has been.
    fn conflicts_with(&self, next: &Edit) -> bool {
        // Two insertions at the same point would be order dependent
        if self.is_insertion() && next.is_insertion() {
            return self.start == next.start;
        }
        next.start < self.end
    }
}

/// Apply `edits` to `source`. Overlapping edits keep the one that starts
/// first (the outer node for nested matches) and drop the rest.
///
/// Returns the new text and the edits that were applied, in source order.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> Result<(String, Vec<Edit>)> {
    // Insertions before replacements at the same offset, wider spans first
    edits.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.is_insertion().cmp(&a.is_insertion()))
            .then_with(|| b.end.cmp(&a.end))
    });

    let mut accepted: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if edit.start > edit.end || edit.end > source.len() {
            anyhow::bail!(
                "Edit span {}..{} is outside the source ({} bytes)",
                edit.start,
                edit.end,
                source.len()
            );
        }
        if !source.is_char_boundary(edit.start) || !source.is_char_boundary(edit.end) {
            anyhow::bail!("Edit span {}..{} splits a UTF-8 character", edit.start, edit.end);
        }

        if let Some(prev) = accepted.last() {
            if prev.conflicts_with(&edit) {
                warn!(
                    rule = %edit.rule,
                    start = edit.start,
                    end = edit.end,
                    "skipping edit nested in an earlier {} edit",
                    prev.rule
                );
                continue;
            }
        }
        accepted.push(edit);
    }

    let extra: usize = accepted.iter().map(|e| e.replacement.len()).sum();
    let mut out = String::with_capacity(source.len() + extra);
    let mut cursor = 0;
    for edit in &accepted {
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);

    Ok((out, accepted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_no_edits() {
        let (out, applied) = apply_edits("unchanged", Vec::new()).unwrap();
        assert_eq!(out, "unchanged");
        assert!(applied.is_empty());
    }

    #[test]
    fn test_apply_replace_and_insert() {
        let edits = vec![
            Edit::insert(5, "!", RuleKind::HandlerSignature),
            Edit::replace(0, 1, "J", RuleKind::ReturnStatement),
        ];
        let (out, applied) = apply_edits("hello world", edits).unwrap();
        assert_eq!(out, "Jello! world");
        assert_eq!(applied[0].start, 0);
        assert_eq!(applied[1].start, 5);
    }

    #[test]
    fn test_nested_edit_is_dropped() {
        let edits = vec![
            Edit::replace(4, 6, "XX", RuleKind::ReturnStatement),
            Edit::replace(0, 10, "outer", RuleKind::ReturnStatement),
        ];
        let (out, applied) = apply_edits("0123456789ab", edits).unwrap();
        assert_eq!(out, "outerab");
        assert_eq!(applied.len(), 1);
    }

    #[test]
    fn test_adjacent_edits_both_apply() {
        let edits = vec![
            Edit::replace(0, 2, "a", RuleKind::ReturnStatement),
            Edit::replace(2, 4, "b", RuleKind::ReturnStatement),
        ];
        let (out, applied) = apply_edits("wxyz", edits).unwrap();
        assert_eq!(out, "ab");
        assert_eq!(applied.len(), 2);
    }

    #[test]
    fn test_insertion_at_replacement_start() {
        let edits = vec![
            Edit::replace(0, 3, "xyz", RuleKind::ReturnStatement),
            Edit::insert(0, ">", RuleKind::HandlerSignature),
        ];
        let (out, applied) = apply_edits("abcdef", edits).unwrap();
        assert_eq!(out, ">xyzdef");
        assert_eq!(applied.len(), 2);
    }

    #[test]
    fn test_duplicate_insertion_dropped() {
        let edits = vec![
            Edit::insert(1, "+", RuleKind::HandlerSignature),
            Edit::insert(1, "+", RuleKind::HandlerSignature),
        ];
        let (out, _) = apply_edits("ab", edits).unwrap();
        assert_eq!(out, "a+b");
    }

    #[test]
    fn test_out_of_range_edit_fails() {
        let edits = vec![Edit::replace(2, 20, "", RuleKind::ReturnStatement)];
        assert!(apply_edits("short", edits).is_err());
    }

    #[test]
    fn test_char_boundary_enforced() {
        let edits = vec![Edit::insert(1, "x", RuleKind::HandlerSignature)];
        assert!(apply_edits("é", edits).is_err());
    }
}
