//! Error taxonomy for hierarchy evaluation.
//!
//! Structural errors ([`GateError::UnsupportedGateType`],
//! [`GateError::UnresolvedGateReference`]) abort a run because downstream
//! counts would be meaningless. [`GateError::ChannelResolution`] may be scoped
//! to the offending subtree, depending on the walker's
//! [`ChannelErrorPolicy`](crate::walker::ChannelErrorPolicy).

use thiserror::Error;

use crate::population::NodePath;

pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("channel `{channel}` used by gate at {path} is not present in the channel map")]
    ChannelResolution { path: NodePath, channel: String },

    #[error("unsupported gate type `{tag}` at {path}")]
    UnsupportedGateType { path: NodePath, tag: String },

    #[error("boolean gate at {path} references `{reference}`, which has no result at this level")]
    UnresolvedGateReference { path: NodePath, reference: String },

    #[error("malformed boolean specification `{specification}`: {message}")]
    MalformedSpecification {
        specification: String,
        message: String,
    },

    #[error("invalid polygon: {message}")]
    InvalidPolygon { message: String },

    #[error("result for {path} was already recorded in this run")]
    ResultAlreadyRecorded { path: NodePath },

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

impl GateError {
    /// Whether this error invalidates the whole run rather than one subtree.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::ChannelResolution { .. })
    }

    #[must_use]
    pub fn malformed(specification: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSpecification {
            specification: specification.into(),
            message: message.into(),
        }
    }
}

/// Problems found while validating a hierarchy definition before evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("duplicate population label `{label}` under {parent}")]
    DuplicateLabel { parent: NodePath, label: String },

    #[error("empty population label under {parent}")]
    EmptyLabel { parent: NodePath },

    #[error("population label `{label}` under {parent} contains the path separator")]
    SeparatorInLabel { parent: NodePath, label: String },
}

/// Errors raised while building an [`EventMatrix`](crate::events::EventMatrix)
/// or a [`ChannelMap`](crate::events::ChannelMap).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventMatrixError {
    #[error("event matrix width must be at least 1 (identity column), got {width}")]
    ZeroWidth { width: usize },

    #[error("event data length {len} is not a multiple of row width {width}")]
    RaggedRows { len: usize, width: usize },

    #[error("row {row}: identity value {value} is not a non-negative integer")]
    InvalidIdentity { row: usize, value: f64 },

    #[error("row {row}: identity {identity} already used by an earlier row")]
    DuplicateIdentity { row: usize, identity: u64 },

    #[error("channel ordinal 0 is reserved for the identity column")]
    ReservedOrdinal,

    #[error("channel ordinal {ordinal} is already mapped")]
    DuplicateOrdinal { ordinal: usize },
}
