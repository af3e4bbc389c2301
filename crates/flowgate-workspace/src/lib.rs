#![forbid(unsafe_code)]

//! Workspace documents, event tables, and report export around
//! [`flowgate_core`].
//!
//! The usual flow is: load a [`Workspace`], find the hierarchies that apply to
//! an event file, read its [`EventTable`], evaluate with [`analyze_file`], and
//! write one report per hierarchy.

pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod table;
pub mod workspace;

pub use analysis::{
    FileAnalysis, HierarchyAnalysis, analyze, analyze_all, analyze_file, reports,
};
pub use config::{AnalysisConfig, LogFormat, ReportFormat};
pub use error::{Result, WorkspaceError};
pub use export::{CSV_HEADER, report_file_name, write_csv, write_json, write_report_file};
pub use table::EventTable;
pub use workspace::{
    GroupSummary, HierarchyKind, HierarchyListing, MatchingHierarchies, SampleSummary, Workspace,
    WORKSPACE_SCHEMA_VERSION,
};
