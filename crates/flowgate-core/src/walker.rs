//! Hierarchy walker: two-phase evaluation of a population tree.
//!
//! # Level state machine
//!
//! Every level (the populations sharing one parent) is evaluated by
//! [`LevelPhase`] transitions:
//!
//! ```text
//!  Geometric ──▶ Logical ──▶ Complete
//! ```
//!
//! - **Geometric**: every `Polygon` gate of every population is evaluated
//!   against the level's presented events. Populations without a boolean gate
//!   are settled immediately: their result is recorded and their children are
//!   evaluated with it. Populations with a boolean gate are parked, holding
//!   their partial geometric results.
//! - **Logical**: parked populations are resolved in dependency order. A
//!   population is ready once every sibling it references is settled (or does
//!   not exist, which resolves to an error). When no parked population is
//!   ready, the references form a cycle and the run fails with
//!   [`GateError::UnresolvedGateReference`]. Each resolved population is
//!   recorded, then its children are evaluated with the boolean output.
//! - **Complete**: nothing left to do at this level.
//!
//! # Propagation
//!
//! A population's children only ever see that population's combined result.
//! Sibling results are read by boolean gates but never flow into a sibling's
//! subtree.
//!
//! # Failure Modes
//!
//! | Condition                        | Effect                                        |
//! |----------------------------------|-----------------------------------------------|
//! | Unsupported gate type            | Run aborts (found during validation)          |
//! | Malformed boolean specification  | Run aborts (found during validation)          |
//! | Missing or cyclic boolean target | Run aborts                                    |
//! | Unknown channel, `Isolate`       | Node `Failed`, descendants `Skipped`          |
//! | Unknown channel, `Abort`         | Run aborts                                    |
//! | Boolean target failed            | Node `Failed`, descendants `Skipped`          |
//! | Nested boolean reference         | Term ignored, node `Degraded`, warning logged |

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::boolean::{BooleanExpr, BooleanOutcome, SiblingLookup, parse_specification, resolve_boolean};
use crate::error::{GateError, Result};
use crate::events::{ChannelMap, EventMatrix, EventSubset};
use crate::gate::{GateDefinition, GateResult};
use crate::geometric::evaluate_polygon;
use crate::population::{GatingHierarchy, NodePath, Population};
use crate::results::{GatingRun, NodeOutcome, NodeStatus};

// ============================================================================
// Configuration
// ============================================================================

/// What to do when a geometric gate names a channel that does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelErrorPolicy {
    /// Mark the node failed, skip its subtree, keep evaluating siblings.
    #[default]
    Isolate,
    /// Fail the whole run.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkerConfig {
    pub channel_errors: ChannelErrorPolicy,
}

// ============================================================================
// Level state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelPhase {
    Geometric,
    Logical,
    Complete,
}

/// One gate definition of a parked population.
enum GateSlot {
    Done(GateResult),
    Deferred(BooleanExpr),
}

enum Settled {
    Events(EventSubset),
    Failed,
}

struct Parked<'h> {
    population: &'h Population,
    path: NodePath,
    slots: Vec<GateSlot>,
}

impl Parked<'_> {
    fn references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.slots.iter().flat_map(|slot| match slot {
            GateSlot::Deferred(expr) => expr
                .terms()
                .iter()
                .filter_map(|term| term.sibling().map(|label| (label, term.source.as_str())))
                .collect::<Vec<_>>(),
            GateSlot::Done(_) => Vec::new(),
        })
    }
}

struct LevelState<'h> {
    labels: FxHashSet<&'h str>,
    settled: FxHashMap<&'h str, Settled>,
    parked: Vec<Parked<'h>>,
}

impl<'h> LevelState<'h> {
    fn new(level: &'h [Population]) -> Self {
        Self {
            labels: level.iter().map(|p| p.label.as_str()).collect(),
            settled: FxHashMap::default(),
            parked: Vec::new(),
        }
    }

    fn lookup(&self, label: &str) -> SiblingLookup<'_> {
        match self.settled.get(label) {
            Some(Settled::Events(events)) => SiblingLookup::Available(events),
            Some(Settled::Failed) => SiblingLookup::Failed,
            None if self.labels.contains(label) => SiblingLookup::Pending,
            None => SiblingLookup::Missing,
        }
    }

    /// A parked population is ready when none of its references is pending.
    fn is_ready(&self, parked: &Parked<'_>) -> bool {
        parked
            .references()
            .all(|(label, _)| !matches!(self.lookup(label), SiblingLookup::Pending))
    }
}

// ============================================================================
// HierarchyWalker
// ============================================================================

/// Evaluates a [`GatingHierarchy`] against one event matrix.
///
/// The walker only reads its inputs; every call to [`evaluate`](Self::evaluate)
/// returns a fresh [`GatingRun`].
#[derive(Debug, Clone, Copy)]
pub struct HierarchyWalker<'e> {
    events: &'e EventMatrix,
    channels: &'e ChannelMap,
    config: WalkerConfig,
}

impl<'e> HierarchyWalker<'e> {
    #[must_use]
    pub fn new(events: &'e EventMatrix, channels: &'e ChannelMap) -> Self {
        Self {
            events,
            channels,
            config: WalkerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: WalkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate `hierarchy` and evaluate every population in it.
    pub fn evaluate(&self, hierarchy: &GatingHierarchy) -> Result<GatingRun> {
        hierarchy.validate()?;

        let _span = tracing::info_span!(
            "gating.run",
            events = self.events.len(),
            populations = hierarchy.node_count(),
        )
        .entered();

        let mut run = GatingRun::new(self.events.len());
        self.evaluate_level(
            &NodePath::root(),
            hierarchy.populations(),
            &self.events.full_subset(),
            &mut run,
        )?;

        tracing::debug!(
            target: "flowgate.walker",
            recorded = run.len(),
            problems = run.problems().len(),
            "gating run complete"
        );
        Ok(run)
    }

    fn evaluate_level(
        &self,
        parent: &NodePath,
        level: &[Population],
        presented: &EventSubset,
        run: &mut GatingRun,
    ) -> Result<()> {
        if level.is_empty() {
            return Ok(());
        }

        let _span = tracing::debug_span!(
            "gating.level",
            parent = %parent,
            populations = level.len(),
            presented = presented.len(),
        )
        .entered();

        let mut state = LevelState::new(level);
        let mut phase = LevelPhase::Geometric;
        loop {
            phase = match phase {
                LevelPhase::Geometric => {
                    self.geometric_phase(parent, level, presented, &mut state, run)?;
                    LevelPhase::Logical
                }
                LevelPhase::Logical => {
                    self.logical_phase(presented, &mut state, run)?;
                    LevelPhase::Complete
                }
                LevelPhase::Complete => return Ok(()),
            };
        }
    }

    fn geometric_phase<'h>(
        &self,
        parent: &NodePath,
        level: &'h [Population],
        presented: &EventSubset,
        state: &mut LevelState<'h>,
        run: &mut GatingRun,
    ) -> Result<()> {
        for population in level {
            let path = parent.child(&population.label);

            let slots = match self.evaluate_slots(&path, population, presented) {
                Ok(slots) => slots,
                Err(err @ GateError::ChannelResolution { .. }) => {
                    if self.config.channel_errors == ChannelErrorPolicy::Abort {
                        return Err(err);
                    }
                    self.isolate(path, population, presented.len(), err.to_string(), state, run)?;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if population.has_boolean_gate() {
                state.parked.push(Parked {
                    population,
                    path,
                    slots,
                });
                continue;
            }

            let results: Vec<GateResult> = slots
                .into_iter()
                .filter_map(|slot| match slot {
                    GateSlot::Done(result) => Some(result),
                    GateSlot::Deferred(_) => None,
                })
                .collect();
            let (status, events) = if population.gates.is_empty() {
                (NodeStatus::Ungated, presented.clone())
            } else {
                (NodeStatus::Evaluated, self.combine(presented, &results))
            };
            self.settle(path, population, presented.len(), status, events, results, state, run)?;
        }
        Ok(())
    }

    fn logical_phase(
        &self,
        presented: &EventSubset,
        state: &mut LevelState<'_>,
        run: &mut GatingRun,
    ) -> Result<()> {
        while !state.parked.is_empty() {
            let Some(index) = state.parked.iter().position(|p| state.is_ready(p)) else {
                let stuck = &state.parked[0];
                let reference = stuck
                    .references()
                    .find(|(label, _)| matches!(state.lookup(label), SiblingLookup::Pending))
                    .map(|(_, source)| source.to_string())
                    .unwrap_or_default();
                return Err(GateError::UnresolvedGateReference {
                    path: stuck.path.clone(),
                    reference,
                });
            };

            let parked = state.parked.remove(index);
            self.resolve_parked(parked, presented, state, run)?;
        }
        Ok(())
    }

    fn resolve_parked<'h>(
        &self,
        parked: Parked<'h>,
        presented: &EventSubset,
        state: &mut LevelState<'h>,
        run: &mut GatingRun,
    ) -> Result<()> {
        let Parked {
            population,
            path,
            slots,
        } = parked;

        let mut results = Vec::with_capacity(slots.len());
        let mut diagnostics = Vec::new();
        for slot in slots {
            match slot {
                GateSlot::Done(result) => results.push(result),
                GateSlot::Deferred(expr) => {
                    let outcome = resolve_boolean(&path, self.events, presented, &expr, |label| {
                        state.lookup(label)
                    })?;
                    match outcome {
                        BooleanOutcome::Resolved { result, degraded } => {
                            diagnostics.extend(degraded);
                            results.push(result);
                        }
                        BooleanOutcome::UpstreamFailed { reference } => {
                            let reason = format!("boolean term `{reference}` refers to a failed population");
                            return self.isolate(path, population, presented.len(), reason, state, run);
                        }
                    }
                }
            }
        }

        let status = if diagnostics.is_empty() {
            NodeStatus::Evaluated
        } else {
            NodeStatus::Degraded { diagnostics }
        };
        let events = self.combine(presented, &results);
        self.settle(path, population, presented.len(), status, events, results, state, run)
    }

    /// Evaluate geometric gates now and parse boolean gates for later.
    fn evaluate_slots(
        &self,
        path: &NodePath,
        population: &Population,
        presented: &EventSubset,
    ) -> Result<Vec<GateSlot>> {
        population
            .gates
            .iter()
            .map(|gate| match gate {
                GateDefinition::Polygon(polygon) => {
                    evaluate_polygon(path, self.events, presented, self.channels, polygon)
                        .map(GateSlot::Done)
                }
                GateDefinition::Boolean(boolean) => {
                    parse_specification(&boolean.specification).map(GateSlot::Deferred)
                }
                GateDefinition::Unsupported { tag } => Err(GateError::UnsupportedGateType {
                    path: path.clone(),
                    tag: tag.clone(),
                }),
            })
            .collect()
    }

    fn combine(&self, presented: &EventSubset, results: &[GateResult]) -> EventSubset {
        let parts: Vec<&EventSubset> = results.iter().map(|r| &r.events).collect();
        EventSubset::union_within(presented, self.events, &parts)
    }

    /// Record a population's result, evaluate its children with it, and make
    /// it visible to boolean siblings.
    #[allow(clippy::too_many_arguments)]
    fn settle<'h>(
        &self,
        path: NodePath,
        population: &'h Population,
        parent_count: usize,
        status: NodeStatus,
        events: EventSubset,
        results: Vec<GateResult>,
        state: &mut LevelState<'h>,
        run: &mut GatingRun,
    ) -> Result<()> {
        tracing::debug!(
            target: "flowgate.walker",
            population = %path,
            status = status.label(),
            parent_count,
            filtered_count = events.len(),
            "population evaluated"
        );

        run.record(
            path.clone(),
            NodeOutcome::evaluated(status, parent_count, events.clone(), results),
        )?;
        self.evaluate_level(&path, &population.children, &events, run)?;
        state
            .settled
            .insert(population.label.as_str(), Settled::Events(events));
        Ok(())
    }

    /// Record a scoped failure and skip the failed population's subtree.
    fn isolate<'h>(
        &self,
        path: NodePath,
        population: &'h Population,
        parent_count: usize,
        reason: String,
        state: &mut LevelState<'h>,
        run: &mut GatingRun,
    ) -> Result<()> {
        tracing::warn!(
            target: "flowgate.walker",
            population = %path,
            reason = %reason,
            "population failed; subtree skipped"
        );

        skip_descendants(&path, population, &path, run)?;
        run.record(path, NodeOutcome::failed(reason, parent_count))?;
        state
            .settled
            .insert(population.label.as_str(), Settled::Failed);
        Ok(())
    }
}

fn skip_descendants(
    path: &NodePath,
    population: &Population,
    failed: &NodePath,
    run: &mut GatingRun,
) -> Result<()> {
    for child in &population.children {
        let child_path = path.child(&child.label);
        run.record(child_path.clone(), NodeOutcome::skipped(failed.clone()))?;
        skip_descendants(&child_path, child, failed, run)?;
    }
    Ok(())
}

/// Evaluate `hierarchy` with the default [`WalkerConfig`].
pub fn evaluate(
    hierarchy: &GatingHierarchy,
    events: &EventMatrix,
    channels: &ChannelMap,
) -> Result<GatingRun> {
    HierarchyWalker::new(events, channels).evaluate(hierarchy)
}
