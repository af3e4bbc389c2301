//! Analysis driver: evaluate workspace hierarchies against one event table.
//!
//! Hierarchies never share results, so the hierarchies matching one event
//! file are independent tasks. With `execution.parallel` they run on the rayon
//! pool; the output order is the same either way (sample first, then groups
//! by id). [`reports`] turns the runs into one [`GroupReport`] per hierarchy.

use std::path::Path;

use flowgate_core::{
    ChannelMap, EventMatrix, GatingRun, GroupReport, HierarchyWalker, ReportSource,
    aggregate_groups, sort_rows,
};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::{Result, WorkspaceError};
use crate::table::EventTable;
use crate::workspace::{HierarchyKind, Workspace};

/// One evaluated hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyAnalysis {
    pub kind: HierarchyKind,
    pub id: String,
    /// Sample filename or group name.
    pub name: String,
    #[serde(skip)]
    pub run: GatingRun,
}

/// Everything computed for one event file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAnalysis {
    /// Basename of the event file.
    pub file: String,
    pub analyses: Vec<HierarchyAnalysis>,
}

/// Evaluate one sample or group hierarchy against `events`.
pub fn analyze(
    workspace: &Workspace,
    kind: HierarchyKind,
    id: &str,
    events: &EventMatrix,
    channels: &ChannelMap,
    config: &AnalysisConfig,
) -> Result<HierarchyAnalysis> {
    let hierarchy = workspace.hierarchy(kind, id)?;
    let name = workspace.display_name(kind, id)?.to_string();

    let _span = tracing::info_span!("analysis.hierarchy", kind = %kind, id, name = %name).entered();

    let run = HierarchyWalker::new(events, channels)
        .with_config(config.walker_config())
        .evaluate(hierarchy)?;

    for (path, status) in run.problems() {
        tracing::warn!(target: "flowgate.analysis", population = %path, status = %status, "population did not evaluate cleanly");
    }

    Ok(HierarchyAnalysis {
        kind,
        id: id.to_string(),
        name,
        run,
    })
}

/// Report rows for each analysis, in `analyses` order. Rows are sorted when
/// `report.sort` is set.
pub fn reports(
    workspace: &Workspace,
    analyses: &[HierarchyAnalysis],
    config: &AnalysisConfig,
) -> Result<Vec<GroupReport>> {
    let kinds: Vec<String> = analyses.iter().map(|a| a.kind.to_string()).collect();
    let mut sources = Vec::with_capacity(analyses.len());
    for (analysis, kind) in analyses.iter().zip(&kinds) {
        sources.push(ReportSource {
            kind,
            id: &analysis.id,
            name: &analysis.name,
            hierarchy: workspace.hierarchy(analysis.kind, &analysis.id)?,
            run: &analysis.run,
        });
    }

    let mut reports = aggregate_groups(&sources);
    if config.report.sort {
        for report in &mut reports {
            sort_rows(&mut report.rows);
        }
    }
    Ok(reports)
}

/// Read `event_file` and evaluate every hierarchy that applies to it.
pub fn analyze_file(
    workspace: &Workspace,
    event_file: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<FileAnalysis> {
    let event_file = event_file.as_ref();
    let file = event_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let matching = workspace
        .find_matching(event_file)
        .ok_or_else(|| WorkspaceError::NoMatch { file: file.clone() })?;

    let table = EventTable::read(event_file, config.delimiter())?;

    let mut targets = vec![(HierarchyKind::Sample, matching.sample_id.as_str())];
    targets.extend(
        matching
            .groups
            .iter()
            .map(|id| (HierarchyKind::Group, id.as_str())),
    );

    let analyses = analyze_all(workspace, &targets, &table, config)?;
    Ok(FileAnalysis { file, analyses })
}

/// Evaluate several hierarchies over one table, keeping `targets` order.
pub fn analyze_all(
    workspace: &Workspace,
    targets: &[(HierarchyKind, &str)],
    table: &EventTable,
    config: &AnalysisConfig,
) -> Result<Vec<HierarchyAnalysis>> {
    tracing::debug!(
        target: "flowgate.analysis",
        hierarchies = targets.len(),
        parallel = config.execution.parallel,
        "analyzing hierarchies"
    );

    let run_one = |&(kind, id): &(HierarchyKind, &str)| {
        analyze(workspace, kind, id, &table.events, &table.channels, config)
    };

    if config.execution.parallel {
        targets.par_iter().map(run_one).collect()
    } else {
        targets.iter().map(run_one).collect()
    }
}
