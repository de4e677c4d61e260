//! Wire model of a saved span.
//!
//! `SerializedSpan` is the JSON-compatible record callers persist:
//! `{id, text, type?, restore: {anchors, paths, multipleAnchors, fingerprint, context}}`.
//! The restore data is layered from most to least precise; each layer of the
//! restoration cascade reads exactly one part of it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::anchoring::restore::Layer;
use crate::tree::ElementPath;

/// Unique id of a saved span within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(pub String);

impl SpanId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpanId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SpanId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSpan {
    pub id: SpanId,
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub restore: RestoreData,
    /// Local restore status, never persisted
    #[serde(skip)]
    pub runtime: Option<RuntimeStatus>,
}

impl SerializedSpan {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeStatus {
    pub restored: bool,
    pub layer: Layer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreData {
    pub anchors: AnchorPair,
    pub paths: PathPair,
    pub multiple_anchors: MultiAnchorData,
    pub fingerprint: StructuralFingerprint,
    pub context: TextContext,
}

/// L1: nearest stable identifier above a boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndAnchor {
    /// `id` or the configured custom attribute
    pub attribute: String,
    pub value: String,
    /// Char offset of the boundary within the anchor element's text
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPair {
    pub start: Option<EndAnchor>,
    pub end: Option<EndAnchor>,
}

/// L2: structural path of the element holding a boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndPath {
    pub path: ElementPath,
    /// Char offset within the element's text content
    pub text_offset: usize,
    /// Index of the boundary's text leaf among the element's leaves
    pub leaf_index: usize,
    /// Raw offset inside that leaf
    pub leaf_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPair {
    pub start: EndPath,
    pub end: EndPath,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSignature {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// L3: element signatures of both ends plus their shared structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiAnchorData {
    pub start: ElementSignature,
    pub end: ElementSignature,
    pub common_ancestor: ElementPath,
    /// Steps from the start element up to the common ancestor
    pub ancestor_distance: usize,
    /// Start boundary offset within the start element's text
    pub start_offset: usize,
    pub sibling_index: usize,
    pub sibling_pattern: Vec<String>,
}

/// L4: feature vector of the element containing the whole span
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralFingerprint {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub text_length: usize,
    pub child_count: usize,
    pub depth: usize,
    /// Ancestor tags, nearest first
    pub parent_chain: Vec<String>,
    pub sibling_pattern: Vec<String>,
}

/// Tie-breaking text around the span; never a primary anchor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContext {
    pub preceding: String,
    pub following: String,
    /// Char offset of the span start within the container's text
    pub parent_offset: usize,
    /// Prefix of the container's text
    pub parent_text: String,
    pub cross_element: bool,
}
