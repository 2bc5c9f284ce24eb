//! Numeric comparison of computed ranks against the reference, and the
//! bordered text tables used in verification reports.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::RankError;

/// Decimal places shown in rank tables.
pub const FLOAT_PRECISION: usize = 5;

/// Columns shown by a diff table before the rest collapse into one.
pub const DEFAULT_DIFF_MAX: usize = 50;

/// Result of an element-wise comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub is_correct: bool,
    /// Node ids whose values differ by more than the tolerance.
    pub mismatched: Vec<usize>,
}

/// Compare two rank vectors with an absolute per-element tolerance.
///
/// # Errors
///
/// Returns [`RankError::LengthMismatch`] when the vectors differ in length.
pub fn compare_ranks(
    computed: &[f64],
    expected: &[f64],
    tolerance: f64,
) -> Result<Comparison, RankError> {
    if computed.len() != expected.len() {
        return Err(RankError::LengthMismatch {
            computed: computed.len(),
            expected: expected.len(),
        });
    }

    let mismatched: Vec<usize> = mismatched_ids(computed, expected, tolerance).collect();
    Ok(Comparison {
        is_correct: mismatched.is_empty(),
        mismatched,
    })
}

fn mismatched_ids<'a>(
    computed: &'a [f64],
    expected: &'a [f64],
    tolerance: f64,
) -> impl Iterator<Item = usize> + 'a {
    computed
        .iter()
        .zip(expected)
        .enumerate()
        .filter(move |(_, (c, e))| {
            let diff = (*c - *e).abs();
            diff.is_nan() || diff > tolerance
        })
        .map(|(id, _)| id)
}

fn node_header(label: &str) -> String {
    format!("Node {label}")
}

/// Label of node `id`, or the id itself when `labels` is too short.
fn label_of(labels: &[String], id: usize) -> String {
    labels.get(id).map_or_else(|| id.to_string(), Clone::clone)
}

fn format_value(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// Render a bordered table: one header row, then one row per named series.
///
/// `rows` are `(name, values)` pairs; every `values` must have one entry per
/// label.
#[must_use]
pub fn format_ranks_table(labels: &[String], rows: &[(&str, &[f64])]) -> String {
    let header: Vec<String> = labels.iter().map(|l| node_header(l)).collect();
    let body: Vec<(String, Vec<String>)> = rows
        .iter()
        .map(|(name, values)| {
            (
                (*name).to_string(),
                values.iter().map(|v| format_value(*v)).collect(),
            )
        })
        .collect();
    render_table(&header, &body)
}

/// Render only the columns where `computed` and `expected` disagree.
///
/// When more than `diff_max` columns differ, the first `diff_max` are shown
/// and the remainder collapse into a single `first..last` column whose
/// values are zero. Nodes beyond the end of `labels` are shown by id.
#[must_use]
pub fn format_diff_table(
    labels: &[String],
    computed: &[f64],
    expected: &[f64],
    tolerance: f64,
    diff_max: usize,
) -> String {
    let ids: Vec<usize> = mismatched_ids(computed, expected, tolerance).collect();

    let mut header: Vec<String> = Vec::with_capacity(ids.len().min(diff_max + 1));
    let mut computed_row = Vec::with_capacity(header.capacity());
    let mut expected_row = Vec::with_capacity(header.capacity());

    for &id in ids.iter().take(diff_max) {
        header.push(node_header(&label_of(labels, id)));
        computed_row.push(format_value(computed[id]));
        expected_row.push(format_value(expected[id]));
    }
    if let (Some(&first), Some(&last)) = (ids.get(diff_max), ids.last()) {
        let span = format!("{}..{}", label_of(labels, first), label_of(labels, last));
        header.push(node_header(&span));
        computed_row.push(format_value(0.0));
        expected_row.push(format_value(0.0));
    }

    render_table(
        &header,
        &[
            ("Computed".to_string(), computed_row),
            ("Expected".to_string(), expected_row),
        ],
    )
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_table(header: &[String], rows: &[(String, Vec<String>)]) -> String {
    let name_width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(col, h)| {
            rows.iter()
                .filter_map(|(_, cells)| cells.get(col).map(String::len))
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut border = format!("+{}+", "-".repeat(name_width + 2));
    for w in &widths {
        let _ = write!(border, "{}+", "-".repeat(w + 2));
    }

    let mut out = String::new();
    let _ = writeln!(out, "{border}");
    let _ = write!(out, "| {:^name_width$} |", "");
    for (h, w) in header.iter().zip(&widths) {
        let _ = write!(out, " {h:^w$} |");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{border}");
    for (name, cells) in rows {
        let _ = write!(out, "| {name:^name_width$} |");
        for (cell, w) in cells.iter().zip(&widths) {
            let _ = write!(out, " {cell:^w$} |");
        }
        let _ = writeln!(out);
    }
    let _ = write!(out, "{border}");
    out
}
