//! Event matrix, event subsets, and channel maps.
//!
//! # Layout
//!
//! An [`EventMatrix`] stores events row-major in one `Vec<f64>`. Column 0 of
//! every row is the event's identity ([`EventId`]), assigned once at load time
//! and never interpreted as a measurement. Measurement channel `n` (1-based
//! parameter ordinal in the [`ChannelMap`]) lives at column `n`.
//!
//! # Subsets
//!
//! Filtering never copies rows. An [`EventSubset`] is an ordered list of row
//! positions into one immutable matrix, so subsets produced independently can
//! be combined by identity without comparing coordinates.
//!
//! # Invariants
//!
//! 1. Every row has exactly `width` values.
//! 2. Identities are non-negative integers, unique within the matrix.
//! 3. Subset row positions are strictly increasing and in range for the matrix
//!    they were produced from.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::EventMatrixError;

/// Column holding the per-event identity.
pub const IDENTITY_COLUMN: usize = 0;

// ============================================================================
// EventId
// ============================================================================

/// Stable per-event identity, independent of measured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

// ============================================================================
// EventMatrix
// ============================================================================

/// Read-only matrix of events; column 0 is the identity column.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMatrix {
    width: usize,
    data: Vec<f64>,
    ids: Vec<EventId>,
}

impl EventMatrix {
    /// Build a matrix from rows that already carry an identity in column 0.
    pub fn from_rows(width: usize, data: Vec<f64>) -> Result<Self, EventMatrixError> {
        if width == 0 {
            return Err(EventMatrixError::ZeroWidth { width });
        }
        if data.len() % width != 0 {
            return Err(EventMatrixError::RaggedRows {
                len: data.len(),
                width,
            });
        }

        let rows = data.len() / width;
        let mut ids = Vec::with_capacity(rows);
        let mut seen = FxHashSet::default();
        seen.reserve(rows);

        for row in 0..rows {
            let value = data[row * width + IDENTITY_COLUMN];
            if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64
            {
                return Err(EventMatrixError::InvalidIdentity { row, value });
            }
            let identity = value as u64;
            if !seen.insert(identity) {
                return Err(EventMatrixError::DuplicateIdentity { row, identity });
            }
            ids.push(EventId(identity));
        }

        Ok(Self { width, data, ids })
    }

    /// Build a matrix from raw measurements, assigning identities `0..n` in
    /// acquisition order.
    pub fn from_measurements(
        channel_count: usize,
        measurements: &[f64],
    ) -> Result<Self, EventMatrixError> {
        if channel_count == 0 {
            return Err(EventMatrixError::ZeroWidth { width: 0 });
        }
        if measurements.len() % channel_count != 0 {
            return Err(EventMatrixError::RaggedRows {
                len: measurements.len(),
                width: channel_count,
            });
        }

        let rows = measurements.len() / channel_count;
        let width = channel_count + 1;
        let mut data = Vec::with_capacity(rows * width);
        for (row, chunk) in measurements.chunks_exact(channel_count).enumerate() {
            data.push(row as f64);
            data.extend_from_slice(chunk);
        }
        let ids = (0..rows as u64).map(EventId).collect();

        Ok(Self { width, data, ids })
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Row width, including the identity column.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of measurement channels (width minus the identity column).
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.width - 1
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.width;
        &self.data[start..start + self.width]
    }

    #[must_use]
    pub fn value(&self, row: usize, column: usize) -> f64 {
        self.data[row * self.width + column]
    }

    #[must_use]
    pub fn identity(&self, row: usize) -> EventId {
        self.ids[row]
    }

    /// Subset containing every event, in matrix order.
    #[must_use]
    pub fn full_subset(&self) -> EventSubset {
        EventSubset {
            rows: (0..self.len()).collect(),
        }
    }
}

// ============================================================================
// EventSubset
// ============================================================================

/// Identity-preserving selection of rows from one [`EventMatrix`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EventSubset {
    rows: Vec<usize>,
}

impl EventSubset {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Matrix row positions, ascending.
    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Keep the rows whose mask entry is `true`. `mask` is indexed like
    /// [`rows`](Self::rows).
    #[must_use]
    pub fn select(&self, mask: &[bool]) -> Self {
        debug_assert_eq!(mask.len(), self.rows.len());
        Self {
            rows: self
                .rows
                .iter()
                .zip(mask)
                .filter_map(|(&row, &keep)| keep.then_some(row))
                .collect(),
        }
    }

    /// Identities of the subset's events, in subset order.
    pub fn identities<'a>(&'a self, events: &'a EventMatrix) -> impl Iterator<Item = EventId> + 'a {
        self.rows.iter().map(|&row| events.identity(row))
    }

    /// Identity set for membership tests.
    #[must_use]
    pub fn identity_set(&self, events: &EventMatrix) -> FxHashSet<EventId> {
        let mut set = FxHashSet::default();
        set.reserve(self.rows.len());
        set.extend(self.identities(events));
        set
    }

    /// Union by identity of several subsets drawn from the same presented
    /// subset, preserving presented order and never duplicating an event.
    #[must_use]
    pub fn union_within(
        presented: &EventSubset,
        events: &EventMatrix,
        parts: &[&EventSubset],
    ) -> EventSubset {
        match parts {
            [] => EventSubset::empty(),
            [single] => (*single).clone(),
            _ => {
                let mut members = FxHashSet::default();
                for part in parts {
                    members.extend(part.identities(events));
                }
                let mask: Vec<bool> = presented
                    .identities(events)
                    .map(|id| members.contains(&id))
                    .collect();
                presented.select(&mask)
            }
        }
    }
}

impl FromIterator<usize> for EventSubset {
    /// Collect row positions; they are sorted and deduplicated.
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut rows: Vec<usize> = iter.into_iter().collect();
        rows.sort_unstable();
        rows.dedup();
        Self { rows }
    }
}

// ============================================================================
// ChannelMap
// ============================================================================

/// Prefix some acquisition software prepends to compensated channel names.
pub const COMPENSATED_PREFIX: &str = "Comp-";

/// Names recorded for one channel: the short parameter name (`PnN`) and the
/// optional stain/long name (`PnS`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLabels {
    pub pnn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pns: Option<String>,
}

impl ChannelLabels {
    #[must_use]
    pub fn new(pnn: impl Into<String>) -> Self {
        Self {
            pnn: pnn.into(),
            pns: None,
        }
    }

    #[must_use]
    pub fn with_stain(mut self, pns: impl Into<String>) -> Self {
        self.pns = Some(pns.into());
        self
    }
}

/// Channel ordinal (1-based) to channel names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    channels: BTreeMap<usize, ChannelLabels>,
}

impl ChannelMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map channels `1..=n` to the given short names, in order.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| (index + 1, ChannelLabels::new(name)))
            .collect();
        Self { channels }
    }

    pub fn insert(&mut self, ordinal: usize, labels: ChannelLabels) -> Result<(), EventMatrixError> {
        if ordinal == IDENTITY_COLUMN {
            return Err(EventMatrixError::ReservedOrdinal);
        }
        if self.channels.contains_key(&ordinal) {
            return Err(EventMatrixError::DuplicateOrdinal { ordinal });
        }
        self.channels.insert(ordinal, labels);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&ChannelLabels> {
        self.channels.get(&ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ChannelLabels)> {
        self.channels.iter().map(|(ordinal, labels)| (*ordinal, labels))
    }

    /// Resolve a gate axis name to a matrix column.
    ///
    /// Tries an exact `PnN` match, then an exact `PnS` match, then retries
    /// both with a leading [`COMPENSATED_PREFIX`] removed.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.resolve_exact(name).or_else(|| {
            name.strip_prefix(COMPENSATED_PREFIX)
                .and_then(|bare| self.resolve_exact(bare))
        })
    }

    fn resolve_exact(&self, name: &str) -> Option<usize> {
        self.channels
            .iter()
            .find(|(_, labels)| labels.pnn == name)
            .or_else(|| {
                self.channels
                    .iter()
                    .find(|(_, labels)| labels.pns.as_deref() == Some(name))
            })
            .map(|(ordinal, _)| *ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> EventMatrix {
        EventMatrix::from_measurements(2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn measurements_get_sequential_identities() {
        let events = matrix();
        assert_eq!(events.len(), 3);
        assert_eq!(events.width(), 3);
        assert_eq!(events.channel_count(), 2);
        assert_eq!(events.row(1), &[1.0, 3.0, 4.0]);
        assert_eq!(events.identity(2), EventId(2));
    }

    #[test]
    fn from_rows_rejects_ragged_data() {
        let err = EventMatrix::from_rows(3, vec![0.0, 1.0]).unwrap_err();
        assert_eq!(err, EventMatrixError::RaggedRows { len: 2, width: 3 });
    }

    #[test]
    fn from_rows_rejects_fractional_identity() {
        let err = EventMatrix::from_rows(2, vec![0.0, 1.0, 1.5, 2.0]).unwrap_err();
        assert!(matches!(err, EventMatrixError::InvalidIdentity { row: 1, .. }));
    }

    #[test]
    fn from_rows_rejects_duplicate_identity() {
        let err = EventMatrix::from_rows(2, vec![7.0, 1.0, 7.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            EventMatrixError::DuplicateIdentity {
                row: 1,
                identity: 7
            }
        );
    }

    #[test]
    fn identities_survive_non_sequential_assignment() {
        let events = EventMatrix::from_rows(2, vec![42.0, 1.0, 7.0, 2.0]).unwrap();
        let ids: Vec<_> = events.full_subset().identities(&events).collect();
        assert_eq!(ids, vec![EventId(42), EventId(7)]);
    }

    #[test]
    fn select_keeps_masked_rows_in_order() {
        let events = matrix();
        let subset = events.full_subset().select(&[true, false, true]);
        assert_eq!(subset.rows(), &[0, 2]);
    }

    #[test]
    fn union_within_deduplicates_overlap() {
        let events = matrix();
        let presented = events.full_subset();
        let a: EventSubset = [0, 1].into_iter().collect();
        let b: EventSubset = [1, 2].into_iter().collect();
        let union = EventSubset::union_within(&presented, &events, &[&a, &b]);
        assert_eq!(union.rows(), &[0, 1, 2]);
    }

    #[test]
    fn channel_resolution_prefers_pnn_then_pns_then_bare() {
        let mut channels = ChannelMap::new();
        channels.insert(1, ChannelLabels::new("FSC-A")).unwrap();
        channels
            .insert(2, ChannelLabels::new("FL1-A").with_stain("CD3"))
            .unwrap();

        assert_eq!(channels.resolve("FSC-A"), Some(1));
        assert_eq!(channels.resolve("CD3"), Some(2));
        assert_eq!(channels.resolve("Comp-FL1-A"), Some(2));
        assert_eq!(channels.resolve("SSC-A"), None);
    }

    #[test]
    fn identity_ordinal_is_reserved() {
        let mut channels = ChannelMap::new();
        assert_eq!(
            channels.insert(0, ChannelLabels::new("Index")),
            Err(EventMatrixError::ReservedOrdinal)
        );
    }
}
