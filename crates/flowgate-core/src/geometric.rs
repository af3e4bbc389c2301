//! Geometric gate evaluation.

use crate::error::{GateError, Result};
use crate::events::{ChannelMap, EventMatrix, EventSubset};
use crate::gate::{GateResult, PolygonGate};
use crate::population::NodePath;

/// Keep the presented events whose `(x_axis, y_axis)` projection lies inside
/// or on the gate's polygon.
///
/// Both axes are resolved through `channels` before any event is tested; an
/// unknown axis name is a [`GateError::ChannelResolution`] for `path`.
pub fn evaluate_polygon(
    path: &NodePath,
    events: &EventMatrix,
    presented: &EventSubset,
    channels: &ChannelMap,
    gate: &PolygonGate,
) -> Result<GateResult> {
    let x = resolve_column(path, events, channels, &gate.x_axis)?;
    let y = resolve_column(path, events, channels, &gate.y_axis)?;

    let mask: Vec<bool> = presented
        .rows()
        .iter()
        .map(|&row| gate.polygon.contains(events.value(row, x), events.value(row, y)))
        .collect();

    Ok(GateResult {
        events: presented.select(&mask),
        parent_count: presented.len(),
    })
}

fn resolve_column(
    path: &NodePath,
    events: &EventMatrix,
    channels: &ChannelMap,
    name: &str,
) -> Result<usize> {
    channels
        .resolve(name)
        .filter(|&column| column < events.width())
        .ok_or_else(|| GateError::ChannelResolution {
            path: path.clone(),
            channel: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    fn fixture() -> (EventMatrix, ChannelMap) {
        // (FSC-A, SSC-A)
        let events = EventMatrix::from_measurements(
            2,
            &[0.0, 5.0, 5.0, 5.0, 11.0, 5.0, 10.0, 10.0, 5.0, -1.0],
        )
        .unwrap();
        (events, ChannelMap::from_names(["FSC-A", "SSC-A"]))
    }

    fn square_gate(x: &str, y: &str) -> PolygonGate {
        PolygonGate::new(
            x,
            y,
            Polygon::from_points(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]).unwrap(),
        )
    }

    #[test]
    fn keeps_interior_and_boundary_events() {
        let (events, channels) = fixture();
        let result = evaluate_polygon(
            &NodePath::root(),
            &events,
            &events.full_subset(),
            &channels,
            &square_gate("FSC-A", "SSC-A"),
        )
        .unwrap();
        assert_eq!(result.events.rows(), &[0, 1, 3]);
        assert_eq!(result.parent_count, 5);
    }

    #[test]
    fn only_presented_events_are_tested() {
        let (events, channels) = fixture();
        let presented: EventSubset = [1, 2].into_iter().collect();
        let result = evaluate_polygon(
            &NodePath::root(),
            &events,
            &presented,
            &channels,
            &square_gate("FSC-A", "SSC-A"),
        )
        .unwrap();
        assert_eq!(result.events.rows(), &[1]);
        assert_eq!(result.parent_count, 2);
    }

    #[test]
    fn unknown_channel_fails_with_its_name() {
        let (events, channels) = fixture();
        let path = NodePath::from_labels(["Lymphocytes"]);
        let err = evaluate_polygon(
            &path,
            &events,
            &events.full_subset(),
            &channels,
            &square_gate("FSC-A", "CD3"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GateError::ChannelResolution {
                path,
                channel: "CD3".into()
            }
        );
    }

    #[test]
    fn channel_beyond_matrix_width_is_unresolved() {
        let (events, _) = fixture();
        let channels = ChannelMap::from_names(["FSC-A", "SSC-A", "CD3"]);
        assert!(
            evaluate_polygon(
                &NodePath::root(),
                &events,
                &events.full_subset(),
                &channels,
                &square_gate("CD3", "SSC-A"),
            )
            .is_err()
        );
    }
}
