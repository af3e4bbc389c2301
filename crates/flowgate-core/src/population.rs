//! Population tree definition.
//!
//! A [`GatingHierarchy`] is the canonical, immutable definition of a gating
//! scheme. Evaluation never writes into it; results live in a separate
//! [`GatingRun`](crate::results::GatingRun) overlay keyed by [`NodePath`], so
//! one hierarchy can back any number of successive or concurrent runs.
//!
//! # Invariants
//!
//! 1. The tree is acyclic (children are owned).
//! 2. Labels are non-empty and unique among siblings.
//! 3. Labels never contain [`PATH_SEPARATOR`], so a node path round-trips
//!    through its string form.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::boolean::parse_specification;
use crate::error::{GateError, HierarchyError, Result};
use crate::gate::GateDefinition;

/// Separator between labels in ancestor paths and boolean references.
pub const PATH_SEPARATOR: char = '/';

/// Sentinel label for the (unnamed) parent of the top-level populations.
pub const ROOT_LABEL: &str = "root";

// ============================================================================
// NodePath
// ============================================================================

/// Labels from the top level down to one population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(Vec<String>);

impl NodePath {
    /// The path of the top level's parent.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn child(&self, label: &str) -> Self {
        let mut labels = self.0.clone();
        labels.push(label.to_string());
        Self(labels)
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Ancestor chain rooted at [`ROOT_LABEL`], e.g. `root/Lymphocytes` for
    /// `Lymphocytes/CD3+`.
    #[must_use]
    pub fn ancestor_path(&self) -> String {
        let mut path = String::from(ROOT_LABEL);
        if let Some((_, ancestors)) = self.0.split_last() {
            for label in ancestors {
                path.push(PATH_SEPARATOR);
                path.push_str(label);
            }
        }
        path
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(ROOT_LABEL);
        }
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            f.write_str(label)?;
        }
        Ok(())
    }
}

// ============================================================================
// Population
// ============================================================================

/// A named node: its gates and its ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub label: String,
    #[serde(default)]
    pub gates: Vec<GateDefinition>,
    #[serde(default)]
    pub children: Vec<Population>,
}

impl Population {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            gates: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: impl Into<GateDefinition>) -> Self {
        self.gates.push(gate.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Population) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn has_boolean_gate(&self) -> bool {
        self.gates.iter().any(GateDefinition::is_boolean)
    }

    /// Type reported for this population: the first definition's tag.
    #[must_use]
    pub fn primary_type(&self) -> Option<&str> {
        self.gates.first().map(GateDefinition::type_name)
    }
}

// ============================================================================
// GatingHierarchy
// ============================================================================

/// The top-level populations of one gating scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatingHierarchy {
    populations: Vec<Population>,
}

impl GatingHierarchy {
    #[must_use]
    pub fn new(populations: Vec<Population>) -> Self {
        Self { populations }
    }

    #[must_use]
    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    /// Number of populations at every depth.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Depth-first pre-order traversal with each node's path.
    pub fn iter(&self) -> HierarchyIter<'_> {
        let mut stack: Vec<(NodePath, &Population)> = self
            .populations
            .iter()
            .map(|p| (NodePath::root().child(&p.label), p))
            .collect();
        stack.reverse();
        HierarchyIter { stack }
    }

    /// Check structural invariants and gate definitions before evaluation.
    ///
    /// Rejects duplicate or malformed labels, unsupported gate types, and
    /// boolean specifications that do not parse.
    pub fn validate(&self) -> Result<()> {
        validate_level(&NodePath::root(), &self.populations)
    }
}

fn validate_level(parent: &NodePath, level: &[Population]) -> Result<()> {
    let mut seen = FxHashSet::default();
    for population in level {
        if population.label.is_empty() {
            return Err(HierarchyError::EmptyLabel {
                parent: parent.clone(),
            }
            .into());
        }
        if population.label.contains(PATH_SEPARATOR) {
            return Err(HierarchyError::SeparatorInLabel {
                parent: parent.clone(),
                label: population.label.clone(),
            }
            .into());
        }
        if !seen.insert(population.label.as_str()) {
            return Err(HierarchyError::DuplicateLabel {
                parent: parent.clone(),
                label: population.label.clone(),
            }
            .into());
        }

        let path = parent.child(&population.label);
        for gate in &population.gates {
            match gate {
                GateDefinition::Polygon(_) => {}
                GateDefinition::Boolean(boolean) => {
                    parse_specification(&boolean.specification)?;
                }
                GateDefinition::Unsupported { tag } => {
                    return Err(GateError::UnsupportedGateType {
                        path,
                        tag: tag.clone(),
                    });
                }
            }
        }
        validate_level(&path, &population.children)?;
    }
    Ok(())
}

/// Iterator returned by [`GatingHierarchy::iter`].
pub struct HierarchyIter<'a> {
    stack: Vec<(NodePath, &'a Population)>,
}

impl<'a> Iterator for HierarchyIter<'a> {
    type Item = (NodePath, &'a Population);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, population) = self.stack.pop()?;
        for child in population.children.iter().rev() {
            self.stack.push((path.child(&child.label), child));
        }
        Some((path, population))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::BooleanGate;

    fn tree() -> GatingHierarchy {
        GatingHierarchy::new(vec![
            Population::new("Lymphocytes")
                .with_child(Population::new("CD3+"))
                .with_child(Population::new("NOT-CD3")),
            Population::new("Debris"),
        ])
    }

    #[test]
    fn ancestor_path_is_rooted_at_sentinel() {
        let path = NodePath::from_labels(["Lymphocytes", "CD3+"]);
        assert_eq!(path.ancestor_path(), "root/Lymphocytes");
        assert_eq!(NodePath::from_labels(["Lymphocytes"]).ancestor_path(), "root");
        assert_eq!(path.to_string(), "Lymphocytes/CD3+");
        assert_eq!(NodePath::root().to_string(), "root");
    }

    #[test]
    fn iteration_is_depth_first_pre_order() {
        let labels: Vec<String> = tree().iter().map(|(path, _)| path.to_string()).collect();
        assert_eq!(
            labels,
            vec![
                "Lymphocytes",
                "Lymphocytes/CD3+",
                "Lymphocytes/NOT-CD3",
                "Debris"
            ]
        );
    }

    #[test]
    fn duplicate_sibling_labels_are_rejected() {
        let tree = GatingHierarchy::new(vec![Population::new("A"), Population::new("A")]);
        assert_eq!(
            tree.validate(),
            Err(GateError::Hierarchy(HierarchyError::DuplicateLabel {
                parent: NodePath::root(),
                label: "A".to_string(),
            }))
        );
    }

    #[test]
    fn same_label_under_different_parents_is_allowed() {
        let tree = GatingHierarchy::new(vec![
            Population::new("A").with_child(Population::new("X")),
            Population::new("B").with_child(Population::new("X")),
        ]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn unsupported_gate_fails_validation_with_path() {
        let tree = GatingHierarchy::new(vec![Population::new("A").with_child(
            Population::new("B").with_gate(GateDefinition::Unsupported {
                tag: "Ellipsoid".into(),
            }),
        )]);
        assert_eq!(
            tree.validate(),
            Err(GateError::UnsupportedGateType {
                path: NodePath::from_labels(["A", "B"]),
                tag: "Ellipsoid".into(),
            })
        );
    }

    #[test]
    fn malformed_boolean_fails_validation() {
        let tree = GatingHierarchy::new(vec![
            Population::new("A").with_gate(BooleanGate::new("A/B & ")),
        ]);
        assert!(matches!(
            tree.validate(),
            Err(GateError::MalformedSpecification { .. })
        ));
    }

    #[test]
    fn hierarchy_deserializes_from_population_list() {
        let tree: GatingHierarchy = serde_json::from_str(
            r#"[{"label":"Lymphocytes","gates":[],"children":[{"label":"CD3+"}]}]"#,
        )
        .unwrap();
        assert_eq!(tree.node_count(), 2);
    }
}
