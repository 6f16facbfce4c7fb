//! Change detection and diff rendering for the publish-confirmation and
//! version-comparison views.
//!
//! Documents are serialized to pretty-printed JSON with stable key order
//! (serde struct field order), diffed line by line, and laid out as
//! side-by-side rows with word-level highlight spans. Variation values and
//! condition operands are strings end to end, so arbitrarily large numbers
//! pass through the serialize step untouched.

use crate::models::TargetingSnapshot;

/// Structural equality check gating the publish action: true when the
/// current editable state differs from the baseline in any field,
/// ordering included.
pub fn is_dirty(current: &TargetingSnapshot, baseline: &TargetingSnapshot) -> bool {
    current != baseline
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

/// One line of the unified line-level patch.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub text: String,
}

/// A run of characters within a cell, highlighted when it differs from the
/// paired line.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffSpan {
    pub text: String,
    pub emphasized: bool,
}

/// One side of a side-by-side row.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffCell {
    pub kind: LineKind,
    pub spans: Vec<DiffSpan>,
}

/// One side-by-side row; a missing side renders as an empty cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffRow {
    pub left: Option<DiffCell>,
    pub right: Option<DiffCell>,
}

/// A fully rendered diff ready for display.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedDiff {
    pub rows: Vec<DiffRow>,
    pub changed_lines: usize,
}

impl RenderedDiff {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changed_lines == 0
    }
}

/// Build the side-by-side diff between two documents. A missing document
/// (not yet loaded) yields an empty diff, not an error.
pub fn build_diff(
    before: Option<&TargetingSnapshot>,
    after: Option<&TargetingSnapshot>,
) -> RenderedDiff {
    let (Some(before), Some(after)) = (before, after) else {
        return RenderedDiff::empty();
    };
    let before_text = to_pretty_json(before);
    let after_text = to_pretty_json(after);
    let lines = diff_lines(&before_text, &after_text);
    layout_rows(&lines)
}

/// Deterministic pretty-printed JSON: key order is serde struct field
/// order, never alphabetical.
pub fn to_pretty_json(snapshot: &TargetingSnapshot) -> String {
    serde_json::to_string_pretty(snapshot).unwrap_or_default()
}

/// Unified line-level patch between two texts.
pub fn diff_lines(before: &str, after: &str) -> Vec<DiffLine> {
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    diff_slices(&before_lines, &after_lines)
        .into_iter()
        .map(|op| match op {
            DiffOp::Equal(i, _) => DiffLine {
                kind: LineKind::Context,
                text: before_lines[i].to_string(),
            },
            DiffOp::Delete(i) => DiffLine {
                kind: LineKind::Removed,
                text: before_lines[i].to_string(),
            },
            DiffOp::Insert(j) => DiffLine {
                kind: LineKind::Added,
                text: after_lines[j].to_string(),
            },
        })
        .collect()
}

/// Render the diff as an HTML table for the confirmation modal.
pub fn render_html(diff: &RenderedDiff) -> String {
    let mut html = String::from("<table class=\"diff\">");
    for row in &diff.rows {
        html.push_str("<tr>");
        render_cell(&mut html, row.left.as_ref());
        render_cell(&mut html, row.right.as_ref());
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

fn render_cell(html: &mut String, cell: Option<&DiffCell>) {
    match cell {
        None => html.push_str("<td class=\"diff-empty\"></td>"),
        Some(cell) => {
            let class = match cell.kind {
                LineKind::Context => "diff-context",
                LineKind::Added => "diff-added",
                LineKind::Removed => "diff-removed",
            };
            html.push_str(&format!("<td class=\"{}\">", class));
            for span in &cell.spans {
                if span.emphasized {
                    html.push_str("<span class=\"diff-emph\">");
                    html.push_str(&escape_html(&span.text));
                    html.push_str("</span>");
                } else {
                    html.push_str(&escape_html(&span.text));
                }
            }
            html.push_str("</td>");
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Pair removed/added runs into side-by-side rows and compute word-level
/// highlights for paired lines.
fn layout_rows(lines: &[DiffLine]) -> RenderedDiff {
    let mut rows = Vec::new();
    let mut changed_lines = 0;
    let mut i = 0;

    while i < lines.len() {
        match lines[i].kind {
            LineKind::Context => {
                let cell = DiffCell {
                    kind: LineKind::Context,
                    spans: vec![DiffSpan {
                        text: lines[i].text.clone(),
                        emphasized: false,
                    }],
                };
                rows.push(DiffRow {
                    left: Some(cell.clone()),
                    right: Some(cell),
                });
                i += 1;
            }
            _ => {
                let mut removed = Vec::new();
                let mut added = Vec::new();
                while i < lines.len() && lines[i].kind == LineKind::Removed {
                    removed.push(lines[i].text.clone());
                    i += 1;
                }
                while i < lines.len() && lines[i].kind == LineKind::Added {
                    added.push(lines[i].text.clone());
                    i += 1;
                }
                changed_lines += removed.len() + added.len();

                let pairs = removed.len().max(added.len());
                for p in 0..pairs {
                    let row = match (removed.get(p), added.get(p)) {
                        (Some(left), Some(right)) => {
                            let (left_spans, right_spans) = word_spans(left, right);
                            DiffRow {
                                left: Some(DiffCell {
                                    kind: LineKind::Removed,
                                    spans: left_spans,
                                }),
                                right: Some(DiffCell {
                                    kind: LineKind::Added,
                                    spans: right_spans,
                                }),
                            }
                        }
                        (Some(left), None) => DiffRow {
                            left: Some(DiffCell {
                                kind: LineKind::Removed,
                                spans: vec![DiffSpan {
                                    text: left.clone(),
                                    emphasized: true,
                                }],
                            }),
                            right: None,
                        },
                        (None, Some(right)) => DiffRow {
                            left: None,
                            right: Some(DiffCell {
                                kind: LineKind::Added,
                                spans: vec![DiffSpan {
                                    text: right.clone(),
                                    emphasized: true,
                                }],
                            }),
                        },
                        (None, None) => DiffRow::default(),
                    };
                    rows.push(row);
                }
            }
        }
    }

    RenderedDiff {
        rows,
        changed_lines,
    }
}

/// Word-level highlight spans for a removed/added line pair.
fn word_spans(left: &str, right: &str) -> (Vec<DiffSpan>, Vec<DiffSpan>) {
    let left_tokens = tokenize(left);
    let right_tokens = tokenize(right);
    let ops = diff_slices(&left_tokens, &right_tokens);

    let mut left_spans = Vec::new();
    let mut right_spans = Vec::new();
    for op in ops {
        match op {
            DiffOp::Equal(i, j) => {
                push_span(&mut left_spans, &left_tokens[i], false);
                push_span(&mut right_spans, &right_tokens[j], false);
            }
            DiffOp::Delete(i) => push_span(&mut left_spans, &left_tokens[i], true),
            DiffOp::Insert(j) => push_span(&mut right_spans, &right_tokens[j], true),
        }
    }
    (left_spans, right_spans)
}

fn push_span(spans: &mut Vec<DiffSpan>, text: &str, emphasized: bool) {
    // Merge adjacent spans of the same emphasis so highlights stay whole.
    if let Some(last) = spans.last_mut() {
        if last.emphasized == emphasized {
            last.text.push_str(text);
            return;
        }
    }
    spans.push(DiffSpan {
        text: text.to_string(),
        emphasized,
    });
}

/// Split a line into alternating word and whitespace tokens.
fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (idx, ch) in line.char_indices() {
        let is_space = ch.is_whitespace();
        match in_space {
            None => in_space = Some(is_space),
            Some(current) if current != is_space => {
                tokens.push(&line[start..idx]);
                start = idx;
                in_space = Some(is_space);
            }
            _ => {}
        }
    }
    if start < line.len() {
        tokens.push(&line[start..]);
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffOp {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// Longest-common-subsequence diff over two slices.
fn diff_slices<T: PartialEq>(a: &[T], b: &[T]) -> Vec<DiffOp> {
    let n = a.len();
    let m = b.len();
    let mut table = vec![0u32; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[idx(i, j)] = if a[i] == b[j] {
                table[idx(i + 1, j + 1)] + 1
            } else {
                table[idx(i + 1, j)].max(table[idx(i, j + 1)])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(DiffOp::Equal(i, j));
            i += 1;
            j += 1;
        } else if table[idx(i + 1, j)] >= table[idx(i, j + 1)] {
            ops.push(DiffOp::Delete(i));
            i += 1;
        } else {
            ops.push(DiffOp::Insert(j));
            j += 1;
        }
    }
    while i < n {
        ops.push(DiffOp::Delete(i));
        i += 1;
    }
    while j < m {
        ops.push(DiffOp::Insert(j));
        j += 1;
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TargetingContent, Variation};

    fn snapshot_with_value(value: &str) -> TargetingSnapshot {
        TargetingSnapshot {
            disabled: false,
            content: TargetingContent {
                rules: Vec::new(),
                variations: vec![Variation {
                    value: value.to_string(),
                    name: None,
                    description: None,
                }],
                default_serve: None,
                disabled_serve: None,
            },
        }
    }

    #[test]
    fn test_diff_on_equal_inputs_is_empty() {
        let snapshot = snapshot_with_value("true");
        let diff = build_diff(Some(&snapshot), Some(&snapshot));
        assert!(diff.is_empty());
        assert!(diff.rows.iter().all(|row| {
            row.left.as_ref().map(|c| c.kind) == Some(LineKind::Context)
                && row.right.as_ref().map(|c| c.kind) == Some(LineKind::Context)
        }));
    }

    #[test]
    fn test_missing_document_yields_empty_diff() {
        let snapshot = snapshot_with_value("true");
        assert!(build_diff(None, Some(&snapshot)).is_empty());
        assert!(build_diff(Some(&snapshot), None).is_empty());
        assert!(build_diff(None, None).is_empty());
    }

    #[test]
    fn test_changed_value_is_highlighted() {
        let before = snapshot_with_value("alpha");
        let after = snapshot_with_value("beta");
        let diff = build_diff(Some(&before), Some(&after));
        assert!(diff.changed_lines > 0);

        let emphasized: Vec<String> = diff
            .rows
            .iter()
            .flat_map(|row| row.left.iter().chain(row.right.iter()))
            .flat_map(|cell| &cell.spans)
            .filter(|span| span.emphasized)
            .map(|span| span.text.clone())
            .collect();
        assert!(emphasized.iter().any(|t| t.contains("alpha")));
        assert!(emphasized.iter().any(|t| t.contains("beta")));
    }

    #[test]
    fn test_big_number_value_survives_both_panes() {
        let value = "12345678901234567890";
        let before = snapshot_with_value(value);
        let mut after = snapshot_with_value(value);
        after.disabled = true;

        let diff = build_diff(Some(&before), Some(&after));
        let all_text = |side: fn(&DiffRow) -> &Option<DiffCell>| -> String {
            diff.rows
                .iter()
                .filter_map(|row| side(row).as_ref())
                .flat_map(|cell| &cell.spans)
                .map(|span| span.text.as_str())
                .collect()
        };
        assert!(all_text(|r| &r.left).contains(value));
        assert!(all_text(|r| &r.right).contains(value));
    }

    #[test]
    fn test_pretty_json_key_order_is_declaration_order() {
        let snapshot = snapshot_with_value("true");
        let text = to_pretty_json(&snapshot);
        let disabled_at = text.find("\"disabled\"").unwrap();
        let content_at = text.find("\"content\"").unwrap();
        assert!(disabled_at < content_at);
    }

    #[test]
    fn test_render_html_escapes_content() {
        let before = snapshot_with_value("<script>");
        let after = snapshot_with_value("safe");
        let html = render_html(&build_diff(Some(&before), Some(&after)));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_is_dirty_detects_any_field_change() {
        let baseline = snapshot_with_value("true");
        let mut current = baseline.clone();
        assert!(!is_dirty(&current, &baseline));

        current.content.variations[0].value = "false".to_string();
        assert!(is_dirty(&current, &baseline));

        current.content.variations[0].value = "true".to_string();
        assert!(!is_dirty(&current, &baseline));
    }
}
