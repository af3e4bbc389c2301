//! Planar polygons with boundary-inclusive containment.
//!
//! A [`Polygon`] is implicitly closed: the last vertex connects back to the
//! first whether or not the vertex list repeats it. Points lying exactly on an
//! edge or a vertex are inside.

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Relative tolerance for the on-edge test.
const EDGE_EPSILON: f64 = 1e-12;

/// One polygon vertex in channel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Vertex {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Closed boundary with at least three finite vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vertex>", into = "Vec<Vertex>")]
pub struct Polygon {
    vertices: Vec<Vertex>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vertex>) -> Result<Self, GateError> {
        if vertices.len() < 3 {
            return Err(GateError::InvalidPolygon {
                message: format!("need at least 3 vertices, got {}", vertices.len()),
            });
        }
        if let Some(bad) = vertices
            .iter()
            .find(|v| !v.x.is_finite() || !v.y.is_finite())
        {
            return Err(GateError::InvalidPolygon {
                message: format!("vertex ({}, {}) is not finite", bad.x, bad.y),
            });
        }
        Ok(Self { vertices })
    }

    /// Convenience constructor from coordinate pairs.
    pub fn from_points(points: &[(f64, f64)]) -> Result<Self, GateError> {
        Self::new(points.iter().copied().map(Vertex::from).collect())
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    fn edges(&self) -> impl Iterator<Item = (Vertex, Vertex)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Boundary-inclusive point-in-polygon test.
    ///
    /// Edges are checked first so that boundary points never depend on the
    /// parity of the crossing count; the interior test is even-odd ray casting.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        if self.edges().any(|(a, b)| on_segment(a, b, x, y)) {
            return true;
        }

        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > y) != (b.y > y) {
                let t = (y - a.y) / (b.y - a.y);
                let crossing_x = a.x + t * (b.x - a.x);
                if x < crossing_x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

impl TryFrom<Vec<Vertex>> for Polygon {
    type Error = GateError;

    fn try_from(vertices: Vec<Vertex>) -> Result<Self, Self::Error> {
        Self::new(vertices)
    }
}

impl From<Polygon> for Vec<Vertex> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices
    }
}

fn on_segment(a: Vertex, b: Vertex, x: f64, y: f64) -> bool {
    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
    if x < min_x || x > max_x || y < min_y || y > max_y {
        return false;
    }
    let cross = (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x);
    let scale = (b.x - a.x).abs().max((b.y - a.y).abs()).max(1.0);
    cross.abs() <= EDGE_EPSILON * scale * scale
}
