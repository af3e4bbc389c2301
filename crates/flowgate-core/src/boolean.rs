//! Boolean gate parsing and resolution.
//!
//! A boolean specification is an AND of terms:
//!
//! ```text
//! spec      := term ( '&' term )*
//! term      := [ '!' ] reference
//! reference := label | group '/' label
//! ```
//!
//! `label` names a sibling of the boolean population (same parent, same
//! level). The `group` segment names that parent and is informational.
//! References with more than two segments point into another level, which the
//! engine does not support: such a term is parsed as [`GateReference::Nested`],
//! logged, and treated as vacuously true so that evaluation continues with a
//! degraded (clearly flagged) result.
//!
//! # Resolution
//!
//! For each term, the referenced sibling's combined result is turned into an
//! identity set, and the presented events are tested for membership (inverted
//! for negated terms). Term masks are ANDed into a mask that starts all-true.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::error::{GateError, Result};
use crate::events::{EventId, EventMatrix, EventSubset};
use crate::gate::GateResult;
use crate::population::{NodePath, PATH_SEPARATOR};

pub const AND_SEPARATOR: char = '&';
pub const NEGATION_MARKER: char = '!';

// ============================================================================
// Parsed form
// ============================================================================

/// What a term points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateReference {
    /// A population at the same level as the boolean gate's population.
    Sibling { label: String },
    /// A reference nested more than one segment deep; not resolvable.
    Nested { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanTerm {
    pub negated: bool,
    pub reference: GateReference,
    /// The term as written, without surrounding whitespace.
    pub source: String,
}

impl BooleanTerm {
    /// Sibling label this term depends on, if it is resolvable.
    #[must_use]
    pub fn sibling(&self) -> Option<&str> {
        match &self.reference {
            GateReference::Sibling { label } => Some(label.as_str()),
            GateReference::Nested { .. } => None,
        }
    }
}

/// A parsed boolean specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanExpr {
    terms: Vec<BooleanTerm>,
}

impl BooleanExpr {
    #[must_use]
    pub fn terms(&self) -> &[BooleanTerm] {
        &self.terms
    }

    /// Sibling labels referenced by resolvable terms, in term order.
    pub fn siblings(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(BooleanTerm::sibling)
    }
}

impl fmt::Display for BooleanExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " {AND_SEPARATOR} ")?;
            }
            f.write_str(&term.source)?;
        }
        Ok(())
    }
}

/// Parse a boolean specification into terms.
pub fn parse_specification(specification: &str) -> Result<BooleanExpr> {
    if specification.trim().is_empty() {
        return Err(GateError::malformed(specification, "specification is empty"));
    }

    let mut terms = Vec::new();
    for raw in specification.split(AND_SEPARATOR) {
        let source = raw.trim();
        if source.is_empty() {
            return Err(GateError::malformed(specification, "empty term"));
        }

        let (negated, reference) = match source.strip_prefix(NEGATION_MARKER) {
            Some(rest) => (true, rest.trim_start()),
            None => (false, source),
        };

        let segments: Vec<&str> = reference.split(PATH_SEPARATOR).collect();
        if segments.iter().any(|segment| segment.trim().is_empty()) {
            return Err(GateError::malformed(
                specification,
                format!("term `{source}` has an empty path segment"),
            ));
        }

        let reference = match segments.as_slice() {
            [label] | [_, label] => GateReference::Sibling {
                label: label.trim().to_string(),
            },
            _ => GateReference::Nested {
                path: reference.to_string(),
            },
        };

        terms.push(BooleanTerm {
            negated,
            reference,
            source: source.to_string(),
        });
    }

    Ok(BooleanExpr { terms })
}

// ============================================================================
// Resolution
// ============================================================================

/// State of a sibling population when a boolean term asks for it.
#[derive(Debug, Clone, Copy)]
pub enum SiblingLookup<'a> {
    /// The sibling's combined result.
    Available(&'a EventSubset),
    /// The sibling failed in this run (scoped failure upstream).
    Failed,
    /// The sibling exists at this level but has not been resolved yet.
    Pending,
    /// No population with that label exists at this level.
    Missing,
}

/// Outcome of resolving one boolean gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooleanOutcome {
    /// The gate resolved. `degraded` lists terms that were ignored.
    Resolved {
        result: GateResult,
        degraded: Vec<String>,
    },
    /// A referenced sibling failed, so this gate cannot be trusted either.
    UpstreamFailed { reference: String },
}

/// Resolve a parsed boolean gate against its level's presented events.
///
/// `lookup` must return [`SiblingLookup::Available`] for every resolvable
/// term by the time this is called; the walker guarantees this by resolving
/// boolean gates in dependency order. A `Pending` or `Missing` sibling is an
/// [`GateError::UnresolvedGateReference`].
pub fn resolve_boolean<'a, F>(
    path: &NodePath,
    events: &EventMatrix,
    presented: &EventSubset,
    expr: &BooleanExpr,
    lookup: F,
) -> Result<BooleanOutcome>
where
    F: Fn(&str) -> SiblingLookup<'a>,
{
    let presented_ids: Vec<EventId> = presented.identities(events).collect();
    let mut mask = vec![true; presented_ids.len()];
    let mut degraded = Vec::new();

    for term in expr.terms() {
        let label = match &term.reference {
            GateReference::Sibling { label } => label,
            GateReference::Nested { path: nested } => {
                tracing::warn!(
                    target: "flowgate.boolean",
                    gate = %path,
                    reference = %nested,
                    "nested boolean reference is not supported; term ignored"
                );
                degraded.push(term.source.clone());
                continue;
            }
        };

        let members: FxHashSet<EventId> = match lookup(label) {
            SiblingLookup::Available(subset) => subset.identity_set(events),
            SiblingLookup::Failed => {
                return Ok(BooleanOutcome::UpstreamFailed {
                    reference: term.source.clone(),
                });
            }
            SiblingLookup::Pending | SiblingLookup::Missing => {
                return Err(GateError::UnresolvedGateReference {
                    path: path.clone(),
                    reference: term.source.clone(),
                });
            }
        };

        for (keep, id) in mask.iter_mut().zip(&presented_ids) {
            if *keep {
                *keep = members.contains(id) != term.negated;
            }
        }
    }

    Ok(BooleanOutcome::Resolved {
        result: GateResult {
            events: presented.select(&mask),
            parent_count: presented.len(),
        },
        degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(n: usize) -> EventMatrix {
        let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
        EventMatrix::from_measurements(1, &data).unwrap()
    }

    fn subset(rows: &[usize]) -> EventSubset {
        rows.iter().copied().collect()
    }

    #[test]
    fn parses_negation_and_two_segment_paths() {
        let expr = parse_specification(" Lymphocytes/CD3+ & !Lymphocytes/CD4+ ").unwrap();
        assert_eq!(expr.terms().len(), 2);
        assert!(!expr.terms()[0].negated);
        assert!(expr.terms()[1].negated);
        assert_eq!(expr.siblings().collect::<Vec<_>>(), vec!["CD3+", "CD4+"]);
        assert_eq!(expr.to_string(), "Lymphocytes/CD3+ & !Lymphocytes/CD4+");
    }

    #[test]
    fn single_segment_names_the_sibling() {
        let expr = parse_specification("!CD3+").unwrap();
        assert_eq!(expr.terms()[0].sibling(), Some("CD3+"));
    }

    #[test]
    fn deep_paths_are_nested() {
        let expr = parse_specification("A/B/C").unwrap();
        assert_eq!(
            expr.terms()[0].reference,
            GateReference::Nested {
                path: "A/B/C".into()
            }
        );
        assert_eq!(expr.siblings().count(), 0);
    }

    #[test]
    fn empty_terms_are_malformed() {
        assert!(parse_specification("").is_err());
        assert!(parse_specification("A/B && A/C").is_err());
        assert!(parse_specification("A/").is_err());
        assert!(parse_specification("!").is_err());
    }

    #[test]
    fn two_positive_terms_intersect() {
        let events = events(10);
        let presented = events.full_subset();
        let a = subset(&[1, 2, 3, 4]);
        let b = subset(&[3, 4, 5]);
        let expr = parse_specification("P/A & P/B").unwrap();
        let outcome = resolve_boolean(&NodePath::root(), &events, &presented, &expr, |label| {
            match label {
                "A" => SiblingLookup::Available(&a),
                "B" => SiblingLookup::Available(&b),
                _ => SiblingLookup::Missing,
            }
        })
        .unwrap();
        match outcome {
            BooleanOutcome::Resolved { result, degraded } => {
                assert_eq!(result.events.rows(), &[3, 4]);
                assert_eq!(result.parent_count, 10);
                assert!(degraded.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn negated_term_is_complement_within_presented() {
        let events = events(10);
        let presented = subset(&[0, 1, 2, 3, 4]);
        let a = subset(&[1, 3]);
        let expr = parse_specification("!P/A").unwrap();
        let outcome = resolve_boolean(&NodePath::root(), &events, &presented, &expr, |_| {
            SiblingLookup::Available(&a)
        })
        .unwrap();
        let BooleanOutcome::Resolved { result, .. } = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(result.events.rows(), &[0, 2, 4]);
        assert_eq!(result.parent_count, 5);
    }

    #[test]
    fn positive_reference_to_empty_sibling_selects_nothing() {
        let events = events(4);
        let presented = events.full_subset();
        let empty = EventSubset::empty();
        let expr = parse_specification("P/A").unwrap();
        let outcome = resolve_boolean(&NodePath::root(), &events, &presented, &expr, |_| {
            SiblingLookup::Available(&empty)
        })
        .unwrap();
        let BooleanOutcome::Resolved { result, .. } = outcome else {
            panic!("expected resolution");
        };
        assert!(result.events.is_empty());
    }

    #[test]
    fn nested_term_is_non_restrictive_and_reported() {
        let events = events(4);
        let presented = events.full_subset();
        let a = subset(&[0, 1]);
        let expr = parse_specification("P/A & X/Y/Z").unwrap();
        let outcome = resolve_boolean(&NodePath::root(), &events, &presented, &expr, |_| {
            SiblingLookup::Available(&a)
        })
        .unwrap();
        let BooleanOutcome::Resolved { result, degraded } = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(result.events.rows(), &[0, 1]);
        assert_eq!(degraded, vec!["X/Y/Z".to_string()]);
    }

    #[test]
    fn missing_sibling_is_unresolved() {
        let events = events(4);
        let presented = events.full_subset();
        let expr = parse_specification("P/Ghost").unwrap();
        let path = NodePath::from_labels(["P", "Bool"]);
        let err = resolve_boolean(&path, &events, &presented, &expr, |_| SiblingLookup::Missing)
            .unwrap_err();
        assert_eq!(
            err,
            GateError::UnresolvedGateReference {
                path,
                reference: "P/Ghost".into()
            }
        );
    }

    #[test]
    fn failed_sibling_propagates_as_upstream_failure() {
        let events = events(4);
        let presented = events.full_subset();
        let expr = parse_specification("!P/A").unwrap();
        let outcome = resolve_boolean(&NodePath::root(), &events, &presented, &expr, |_| {
            SiblingLookup::Failed
        })
        .unwrap();
        assert_eq!(
            outcome,
            BooleanOutcome::UpstreamFailed {
                reference: "!P/A".into()
            }
        );
    }
}
