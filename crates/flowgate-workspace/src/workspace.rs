//! Workspace document: per-sample and per-group gating hierarchies.
//!
//! A workspace pairs event files with the hierarchies that apply to them. A
//! sample owns a hierarchy for exactly one event file (matched by basename); a
//! group owns a hierarchy shared by every sample it lists.
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "samples": {
//!     "1": { "filename": "tube_01.csv", "event_count": 10000, "populations": [] }
//!   },
//!   "groups": {
//!     "2": { "name": "T cells", "samples": ["1"], "populations": [ ... ] }
//!   }
//! }
//! ```
//!
//! Samples without a filename and groups without populations are dropped at
//! load time; they can never be analyzed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use flowgate_core::GatingHierarchy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};

/// Current workspace document version.
pub const WORKSPACE_SCHEMA_VERSION: u16 = 1;

const fn default_schema_version() -> u16 {
    WORKSPACE_SCHEMA_VERSION
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_count: Option<u64>,
    #[serde(default)]
    pub populations: GatingHierarchy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub samples: Vec<String>,
    #[serde(default)]
    pub populations: GatingHierarchy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    #[serde(default)]
    pub samples: BTreeMap<String, SampleEntry>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupEntry>,
}

/// Which kind of hierarchy to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyKind {
    Sample,
    Group,
}

impl fmt::Display for HierarchyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sample => "sample",
            Self::Group => "group",
        })
    }
}

// ============================================================================
// Listing and matching
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub samples: Vec<String>,
}

/// Every hierarchy in a workspace, by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyListing {
    pub samples: Vec<SampleSummary>,
    pub groups: Vec<GroupSummary>,
}

/// Hierarchies that apply to one event file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingHierarchies {
    pub sample_id: String,
    pub groups: Vec<String>,
}

impl Workspace {
    /// An empty document at the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: WORKSPACE_SCHEMA_VERSION,
            samples: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| WorkspaceError::io(path, source))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let mut workspace: Self = serde_json::from_str(s)?;
        workspace.validate()?;
        workspace.prune();
        Ok(workspace)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != WORKSPACE_SCHEMA_VERSION {
            return Err(WorkspaceError::UnsupportedSchema {
                found: self.schema_version,
                expected: WORKSPACE_SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    fn prune(&mut self) {
        self.samples.retain(|id, sample| {
            let keep = !sample.filename.is_empty();
            if !keep {
                tracing::debug!(target: "flowgate.workspace", sample = %id, "dropping sample without filename");
            }
            keep
        });
        self.groups.retain(|id, group| {
            let keep = !group.populations.is_empty();
            if !keep {
                tracing::debug!(target: "flowgate.workspace", group = %id, "dropping group without populations");
            }
            keep
        });
    }

    #[must_use]
    pub fn hierarchies(&self) -> HierarchyListing {
        HierarchyListing {
            samples: self
                .samples
                .iter()
                .map(|(id, sample)| SampleSummary {
                    id: id.clone(),
                    name: sample.filename.clone(),
                })
                .collect(),
            groups: self
                .groups
                .iter()
                .map(|(id, group)| GroupSummary {
                    id: id.clone(),
                    name: group.name.clone(),
                    samples: group.samples.clone(),
                })
                .collect(),
        }
    }

    /// The sample recorded for `event_file`'s basename and the groups it
    /// belongs to. Returns `None` (and logs a warning) when no sample matches.
    #[must_use]
    pub fn find_matching(&self, event_file: impl AsRef<Path>) -> Option<MatchingHierarchies> {
        let event_file = event_file.as_ref();
        let base_name = event_file.file_name()?.to_string_lossy();

        let Some(sample_id) = self
            .samples
            .iter()
            .find(|(_, sample)| sample.filename == base_name)
            .map(|(id, _)| id.clone())
        else {
            tracing::warn!(
                target: "flowgate.workspace",
                file = %base_name,
                "event file was not found in workspace"
            );
            return None;
        };

        let groups = self
            .groups
            .iter()
            .filter(|(_, group)| group.samples.contains(&sample_id))
            .map(|(id, _)| id.clone())
            .collect();

        Some(MatchingHierarchies { sample_id, groups })
    }

    pub fn hierarchy(&self, kind: HierarchyKind, id: &str) -> Result<&GatingHierarchy> {
        match kind {
            HierarchyKind::Sample => self
                .samples
                .get(id)
                .map(|sample| &sample.populations)
                .ok_or_else(|| WorkspaceError::UnknownSample { id: id.to_string() }),
            HierarchyKind::Group => self
                .groups
                .get(id)
                .map(|group| &group.populations)
                .ok_or_else(|| WorkspaceError::UnknownGroup { id: id.to_string() }),
        }
    }

    /// Sample filename or group name.
    pub fn display_name(&self, kind: HierarchyKind, id: &str) -> Result<&str> {
        match kind {
            HierarchyKind::Sample => self
                .samples
                .get(id)
                .map(|sample| sample.filename.as_str())
                .ok_or_else(|| WorkspaceError::UnknownSample { id: id.to_string() }),
            HierarchyKind::Group => self
                .groups
                .get(id)
                .map(|group| group.name.as_str())
                .ok_or_else(|| WorkspaceError::UnknownGroup { id: id.to_string() }),
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
