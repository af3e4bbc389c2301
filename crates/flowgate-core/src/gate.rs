//! Gate definitions and per-gate results.
//!
//! Definitions are tagged by a `type` string in their serialized form:
//!
//! ```json
//! { "type": "Polygon", "x_axis": "FSC-A", "y_axis": "SSC-A",
//!   "vertices": [{"x": 20, "y": 0}, {"x": 20, "y": 100}, {"x": 80, "y": 100}, {"x": 80, "y": 0}] }
//! { "type": "Boolean", "specification": "!Lymphocytes/CD3+" }
//! ```
//!
//! Unknown tags are kept as [`GateDefinition::Unsupported`] rather than
//! rejected at parse time, so that the walker can report exactly which node
//! carries them.

use serde::{Deserialize, Serialize};

use crate::events::EventSubset;
use crate::geometry::{Polygon, Vertex};

pub const POLYGON_TAG: &str = "Polygon";
pub const BOOLEAN_TAG: &str = "Boolean";

/// A geometric gate on a 2-D projection of two named channels.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonGate {
    pub x_axis: String,
    pub y_axis: String,
    pub polygon: Polygon,
    /// Parameter names recorded with the gate; informational only.
    pub parameters: Vec<String>,
}

impl PolygonGate {
    #[must_use]
    pub fn new(x_axis: impl Into<String>, y_axis: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            x_axis: x_axis.into(),
            y_axis: y_axis.into(),
            polygon,
            parameters: Vec::new(),
        }
    }
}

/// A logical gate: AND of (possibly negated) references to sibling populations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanGate {
    pub specification: String,
}

impl BooleanGate {
    #[must_use]
    pub fn new(specification: impl Into<String>) -> Self {
        Self {
            specification: specification.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GateRecord", into = "GateRecord")]
pub enum GateDefinition {
    Polygon(PolygonGate),
    Boolean(BooleanGate),
    /// A gate type this engine does not evaluate.
    Unsupported { tag: String },
}

impl GateDefinition {
    /// The gate type tag as written in the hierarchy source.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Polygon(_) => POLYGON_TAG,
            Self::Boolean(_) => BOOLEAN_TAG,
            Self::Unsupported { tag } => tag.as_str(),
        }
    }

    #[must_use]
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean(_))
    }
}

impl From<PolygonGate> for GateDefinition {
    fn from(gate: PolygonGate) -> Self {
        Self::Polygon(gate)
    }
}

impl From<BooleanGate> for GateDefinition {
    fn from(gate: BooleanGate) -> Self {
        Self::Boolean(gate)
    }
}

/// Flat serialized form shared by every gate type.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GateRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x_axis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y_axis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vertices: Option<Vec<Vertex>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    specification: Option<String>,
}

impl TryFrom<GateRecord> for GateDefinition {
    type Error = String;

    fn try_from(record: GateRecord) -> Result<Self, Self::Error> {
        match record.kind.as_str() {
            POLYGON_TAG => {
                let missing = |field: &str| format!("Polygon gate is missing `{field}`");
                let x_axis = record.x_axis.ok_or_else(|| missing("x_axis"))?;
                let y_axis = record.y_axis.ok_or_else(|| missing("y_axis"))?;
                let vertices = record.vertices.ok_or_else(|| missing("vertices"))?;
                let polygon = Polygon::new(vertices).map_err(|e| e.to_string())?;
                Ok(Self::Polygon(PolygonGate {
                    x_axis,
                    y_axis,
                    polygon,
                    parameters: record.parameters,
                }))
            }
            BOOLEAN_TAG => {
                let specification = record
                    .specification
                    .ok_or_else(|| "Boolean gate is missing `specification`".to_string())?;
                Ok(Self::Boolean(BooleanGate { specification }))
            }
            _ => Ok(Self::Unsupported { tag: record.kind }),
        }
    }
}

impl From<GateDefinition> for GateRecord {
    fn from(gate: GateDefinition) -> Self {
        let mut record = GateRecord {
            kind: gate.type_name().to_string(),
            x_axis: None,
            y_axis: None,
            vertices: None,
            parameters: Vec::new(),
            specification: None,
        };
        match gate {
            GateDefinition::Polygon(polygon) => {
                record.x_axis = Some(polygon.x_axis);
                record.y_axis = Some(polygon.y_axis);
                record.vertices = Some(polygon.polygon.into());
                record.parameters = polygon.parameters;
            }
            GateDefinition::Boolean(boolean) => {
                record.specification = Some(boolean.specification);
            }
            GateDefinition::Unsupported { .. } => {}
        }
        record
    }
}

// ============================================================================
// GateResult
// ============================================================================

/// Output of one gate: the surviving events and how many were presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub events: EventSubset,
    pub parent_count: usize,
}

impl GateResult {
    #[must_use]
    pub fn filtered_count(&self) -> usize {
        self.events.len()
    }
}
