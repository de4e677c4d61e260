use thiserror::Error;

use crate::anchoring::restore::LayerAttempt;
use crate::anchoring::SpanId;
use crate::tree::NodeId;

/// Failures reading positions out of the host tree
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("node {0:?} is not connected to the document root")]
    Detached(NodeId),

    #[error("node {0:?} is not a text leaf")]
    NotText(NodeId),

    #[error("offset {offset} is out of range for node {node:?} (length {len})")]
    OffsetOutOfRange {
        node: NodeId,
        offset: usize,
        len: usize,
    },

    #[error("span end precedes span start")]
    Reversed,
}

/// Invalid or missing configuration. The only failure class that aborts a
/// whole operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("scope root `{0}` is not present in the document")]
    MissingScopeRoot(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid volatile id pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Why a live span could not be turned into a [`SerializedSpan`](crate::SerializedSpan)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    #[error("span is collapsed")]
    Collapsed,

    #[error("span text is empty")]
    EmptyText,

    /// Validation failure: the span lies outside the permitted scope
    #[error("span lies outside the scope root `{scope}`")]
    OutOfScope { scope: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read span from tree: {0}")]
    Tree(#[from] TreeError),
}

/// No restoration layer produced a span
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no restoration layer succeeded for span `{span_id}`")]
pub struct RestoreFailure {
    pub span_id: SpanId,
    pub attempts: Vec<LayerAttempt>,
    /// Set when the cascade was skipped because of a configuration error
    pub config: Option<ConfigError>,
}

/// Boundary comparison failed, typically for spans from disjoint trees
#[derive(Debug, Clone, PartialEq, Error)]
#[error("boundary comparison failed: {0}")]
pub struct ComparisonError(#[from] pub TreeError);
