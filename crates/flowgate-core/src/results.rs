//! Per-run results overlay.
//!
//! A [`GatingRun`] maps each [`NodePath`] of a hierarchy to the
//! [`NodeOutcome`] computed for it in one evaluation. Each entry is written
//! exactly once; recording the same path twice is an error. A new run always
//! starts from an empty overlay, so results from different inputs can never
//! mix.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::events::EventSubset;
use crate::gate::GateResult;
use crate::population::NodePath;

/// How a node's outcome should be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    /// All gates evaluated normally.
    Evaluated,
    /// The population has no gate definitions; events pass through unfiltered.
    Ungated,
    /// Evaluated, but some boolean terms were ignored.
    Degraded { diagnostics: Vec<String> },
    /// The node's own gate could not be evaluated.
    Failed { reason: String },
    /// An ancestor failed, so this node was never evaluated.
    Skipped { failed_ancestor: NodePath },
}

impl NodeStatus {
    /// Short label used in tabular reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Evaluated => "ok",
            Self::Ungated => "ungated",
            Self::Degraded { .. } => "degraded",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }

    /// Whether the node produced a usable event subset.
    #[must_use]
    pub fn has_events(&self) -> bool {
        matches!(self, Self::Evaluated | Self::Ungated | Self::Degraded { .. })
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degraded { diagnostics } => {
                write!(f, "degraded (ignored: {})", diagnostics.join(", "))
            }
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Skipped { failed_ancestor } => write!(f, "skipped (failed: {failed_ancestor})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Everything recorded for one population in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    pub status: NodeStatus,
    /// Events presented to the population; `None` when it was skipped.
    pub parent_count: Option<usize>,
    /// Union of every gate's result; `None` unless the status has events.
    pub events: Option<EventSubset>,
    /// Per-definition results, in definition order.
    pub gate_results: Vec<GateResult>,
}

impl NodeOutcome {
    #[must_use]
    pub fn filtered_count(&self) -> Option<usize> {
        self.events.as_ref().map(EventSubset::len)
    }

    pub(crate) fn evaluated(
        status: NodeStatus,
        parent_count: usize,
        events: EventSubset,
        gate_results: Vec<GateResult>,
    ) -> Self {
        debug_assert!(status.has_events());
        Self {
            status,
            parent_count: Some(parent_count),
            events: Some(events),
            gate_results,
        }
    }

    pub(crate) fn failed(reason: String, parent_count: usize) -> Self {
        Self {
            status: NodeStatus::Failed { reason },
            parent_count: Some(parent_count),
            events: None,
            gate_results: Vec::new(),
        }
    }

    pub(crate) fn skipped(failed_ancestor: NodePath) -> Self {
        Self {
            status: NodeStatus::Skipped { failed_ancestor },
            parent_count: None,
            events: None,
            gate_results: Vec::new(),
        }
    }
}

/// Results of one evaluation, keyed by node path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatingRun {
    outcomes: BTreeMap<NodePath, NodeOutcome>,
    total_events: usize,
}

impl GatingRun {
    #[must_use]
    pub fn new(total_events: usize) -> Self {
        Self {
            outcomes: BTreeMap::new(),
            total_events,
        }
    }

    /// Events presented to the top level.
    #[must_use]
    pub fn total_events(&self) -> usize {
        self.total_events
    }

    /// Record a node's outcome. Each path may be recorded once per run.
    pub fn record(&mut self, path: NodePath, outcome: NodeOutcome) -> Result<()> {
        if self.outcomes.contains_key(&path) {
            return Err(GateError::ResultAlreadyRecorded { path });
        }
        self.outcomes.insert(path, outcome);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, path: &NodePath) -> Option<&NodeOutcome> {
        self.outcomes.get(path)
    }

    /// Convenience lookup by label chain.
    #[must_use]
    pub fn outcome<S: AsRef<str>>(&self, labels: &[S]) -> Option<&NodeOutcome> {
        self.get(&NodePath::from_labels(labels.iter().map(|l| l.as_ref())))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodePath, &NodeOutcome)> {
        self.outcomes.iter()
    }

    /// Paths of nodes that failed or were degraded.
    #[must_use]
    pub fn problems(&self) -> Vec<(&NodePath, &NodeStatus)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome.status,
                    NodeStatus::Failed { .. } | NodeStatus::Degraded { .. }
                )
            })
            .map(|(path, outcome)| (path, &outcome.status))
            .collect()
    }
}
