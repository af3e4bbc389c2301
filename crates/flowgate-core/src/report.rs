//! Result aggregation: flatten an evaluated hierarchy into report rows.
//!
//! Rows come out in depth-first pre-order, one per population. Each row names
//! the population by its ancestor chain (rooted at `root`) and its label, the
//! first gate definition's type, and the counts recorded in the run.
//!
//! Empty counts are meaningful: a failed node has a parent count but no
//! filtered count, and a skipped node has neither.

use serde::{Deserialize, Serialize};

use crate::population::GatingHierarchy;
use crate::results::GatingRun;

/// Gate type reported for populations without gate definitions.
pub const UNGATED_TYPE: &str = "None";

/// One line of the tabular report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub ancestor_path: String,
    pub label: String,
    pub gate_type: String,
    pub parent_count: Option<usize>,
    pub filtered_count: Option<usize>,
    pub status: String,
    /// Gate definitions under this label; more than one means the counts are
    /// a union of regions.
    pub regions: usize,
}

/// Rows for one hierarchy.
///
/// `kind` and `id` identify the hierarchy; `group` is its display name, which
/// need not be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub kind: String,
    pub id: String,
    pub group: String,
    pub rows: Vec<ReportRow>,
}

impl GroupReport {
    /// `<kind>-<id>`, unique among the reports of one analysis.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.kind, self.id)
    }
}

/// One evaluated hierarchy handed to [`aggregate_groups`].
#[derive(Debug, Clone, Copy)]
pub struct ReportSource<'a> {
    pub kind: &'a str,
    pub id: &'a str,
    pub name: &'a str,
    pub hierarchy: &'a GatingHierarchy,
    pub run: &'a GatingRun,
}

/// Flatten `run` over `hierarchy` in depth-first order.
///
/// Populations with no recorded outcome (a run from a different hierarchy)
/// are left out.
#[must_use]
pub fn aggregate(hierarchy: &GatingHierarchy, run: &GatingRun) -> Vec<ReportRow> {
    hierarchy
        .iter()
        .filter_map(|(path, population)| {
            let outcome = run.get(&path)?;
            Some(ReportRow {
                ancestor_path: path.ancestor_path(),
                label: population.label.clone(),
                gate_type: population.primary_type().unwrap_or(UNGATED_TYPE).to_string(),
                parent_count: outcome.parent_count,
                filtered_count: outcome.filtered_count(),
                status: outcome.status.label().to_string(),
                regions: population.gates.len(),
            })
        })
        .collect()
}

/// Aggregate several evaluated hierarchies, keeping their order.
#[must_use]
pub fn aggregate_groups(sources: &[ReportSource<'_>]) -> Vec<GroupReport> {
    sources
        .iter()
        .map(|source| GroupReport {
            kind: source.kind.to_string(),
            id: source.id.to_string(),
            group: source.name.to_string(),
            rows: aggregate(source.hierarchy, source.run),
        })
        .collect()
}

/// Stable sort by `(ancestor_path, label)`.
pub fn sort_rows(rows: &mut [ReportRow]) {
    rows.sort_by(|a, b| {
        a.ancestor_path
            .cmp(&b.ancestor_path)
            .then_with(|| a.label.cmp(&b.label))
    });
}
