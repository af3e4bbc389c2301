#![forbid(unsafe_code)]

//! Gating hierarchy evaluation for cytometry event data.
//!
//! A [`GatingHierarchy`] describes named populations, each filtered from its
//! parent by geometric ([`PolygonGate`]) or logical ([`BooleanGate`]) gates.
//! [`HierarchyWalker`] evaluates the tree against an [`EventMatrix`] and
//! produces a [`GatingRun`]; [`aggregate`] flattens that run into report rows.
//!
//! ```
//! use flowgate_core::{
//!     BooleanGate, ChannelMap, EventMatrix, GatingHierarchy, Polygon, PolygonGate, Population,
//!     aggregate, evaluate,
//! };
//!
//! let events = EventMatrix::from_measurements(2, &[10.0, 1.0, 50.0, 1.0, 90.0, 1.0]).unwrap();
//! let channels = ChannelMap::from_names(["FSC-A", "SSC-A"]);
//! let square = Polygon::from_points(&[(20.0, 0.0), (20.0, 5.0), (80.0, 5.0), (80.0, 0.0)]).unwrap();
//!
//! let hierarchy = GatingHierarchy::new(vec![
//!     Population::new("Cells").with_gate(PolygonGate::new("FSC-A", "SSC-A", square)),
//!     Population::new("Other").with_gate(BooleanGate::new("!root/Cells")),
//! ]);
//!
//! let run = evaluate(&hierarchy, &events, &channels).unwrap();
//! let rows = aggregate(&hierarchy, &run);
//! assert_eq!(rows[0].filtered_count, Some(1));
//! assert_eq!(rows[1].filtered_count, Some(2));
//! ```

pub mod boolean;
pub mod error;
pub mod events;
pub mod gate;
pub mod geometric;
pub mod geometry;
pub mod population;
pub mod report;
pub mod results;
pub mod walker;

pub use boolean::{BooleanExpr, BooleanTerm, GateReference, parse_specification};
pub use error::{EventMatrixError, GateError, HierarchyError, Result};
pub use events::{ChannelLabels, ChannelMap, EventId, EventMatrix, EventSubset};
pub use gate::{BooleanGate, GateDefinition, GateResult, PolygonGate};
pub use geometry::{Polygon, Vertex};
pub use population::{GatingHierarchy, NodePath, PATH_SEPARATOR, Population, ROOT_LABEL};
pub use report::{
    GroupReport, ReportRow, ReportSource, aggregate, aggregate_groups, sort_rows,
};
pub use results::{GatingRun, NodeOutcome, NodeStatus};
pub use walker::{ChannelErrorPolicy, HierarchyWalker, WalkerConfig, evaluate};
