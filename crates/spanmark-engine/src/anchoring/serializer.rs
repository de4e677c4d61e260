//! Extracts a layered [`RestoreData`] descriptor from a live span.
//!
//! Serialization is a pure read of the tree. It never panics or propagates
//! errors to callers of [`Serializer::serialize`]; the typed reason is
//! available through [`Serializer::try_serialize`].

use std::collections::BTreeMap;

use crate::anchoring::filter::IdFilter;
use crate::anchoring::model::{
    AnchorPair, ElementSignature, EndAnchor, EndPath, MultiAnchorData, PathPair, RestoreData,
    SerializedSpan, SpanId, StructuralFingerprint, TextContext,
};
use crate::anchoring::similarity::{char_slice, take_chars, take_last_chars};
use crate::config::AnchorConfig;
use crate::error::{ConfigError, SerializeError, TreeError};
use crate::tree::path::class_list;
use crate::tree::{Boundary, ElementPath, NodeId, Span, TreeAdapter};

/// Attributes worth recording in signatures besides id/class
const SIGNATURE_ATTRIBUTES: &[&str] = &["role", "name", "type", "href", "lang", "title"];
const SIGNATURE_ATTRIBUTE_PREFIXES: &[&str] = &["data-", "aria-"];

/// Resolves the configured scope root; `None` config means the tree root
pub fn scope_root<T: TreeAdapter + ?Sized>(tree: &T, config: &AnchorConfig) -> Result<NodeId, ConfigError> {
    match &config.scope_root {
        Some(id) => tree
            .find_by_id(id)
            .ok_or_else(|| ConfigError::MissingScopeRoot(id.clone())),
        None => Ok(tree.root()),
    }
}

/// Signature-relevant attributes of `node`, skipping `excluded` names
pub fn selected_attributes<T: TreeAdapter + ?Sized>(
    tree: &T,
    node: NodeId,
    excluded: &[&str],
) -> BTreeMap<String, String> {
    tree.attribute_names(node)
        .into_iter()
        .filter(|name| !excluded.contains(name))
        .filter(|name| {
            SIGNATURE_ATTRIBUTES.contains(name)
                || SIGNATURE_ATTRIBUTE_PREFIXES
                    .iter()
                    .any(|prefix| name.starts_with(prefix))
        })
        .filter_map(|name| {
            tree.attribute(node, name)
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

pub fn element_signature<T: TreeAdapter + ?Sized>(
    tree: &T,
    element: NodeId,
    excluded: &[&str],
) -> ElementSignature {
    ElementSignature {
        tag: tree.tag(element).unwrap_or_default().to_string(),
        classes: class_list(tree, element),
        id: tree.attribute(element, "id").map(str::to_string),
        attributes: selected_attributes(tree, element, excluded),
    }
}

/// Tags of the element siblings of `element`, itself included
pub fn sibling_pattern<T: TreeAdapter + ?Sized>(tree: &T, element: NodeId) -> Vec<String> {
    match tree.parent(element) {
        Some(parent) => tree
            .element_children(parent)
            .into_iter()
            .filter_map(|sibling| tree.tag(sibling).map(str::to_string))
            .collect(),
        None => Vec::new(),
    }
}

/// Ancestor tags of `element`, nearest first, at most `limit`
pub fn parent_chain<T: TreeAdapter + ?Sized>(tree: &T, element: NodeId, limit: usize) -> Vec<String> {
    tree.ancestors(element)
        .into_iter()
        .take(limit)
        .filter_map(|ancestor| tree.tag(ancestor).map(str::to_string))
        .collect()
}

pub fn structural_fingerprint<T: TreeAdapter + ?Sized>(
    tree: &T,
    element: NodeId,
    excluded: &[&str],
    chain_depth: usize,
) -> StructuralFingerprint {
    StructuralFingerprint {
        tag: tree.tag(element).unwrap_or_default().to_string(),
        classes: class_list(tree, element),
        attributes: selected_attributes(tree, element, excluded),
        text_length: tree.char_len(element),
        child_count: tree.element_children(element).len(),
        depth: tree.depth(element),
        parent_chain: parent_chain(tree, element, chain_depth),
        sibling_pattern: sibling_pattern(tree, element),
    }
}

pub struct Serializer<'a> {
    config: &'a AnchorConfig,
    filter: &'a dyn IdFilter,
    chain_depth: usize,
}

impl<'a> Serializer<'a> {
    pub fn new(config: &'a AnchorConfig, filter: &'a dyn IdFilter) -> Self {
        Self {
            config,
            filter,
            chain_depth: crate::config::FINGERPRINT_PARENT_CHAIN_DEPTH,
        }
    }

    /// Depth of the recorded parent-tag chain
    pub fn with_chain_depth(mut self, depth: usize) -> Self {
        self.chain_depth = depth;
        self
    }

    /// Serialize `span`, logging and swallowing any failure
    pub fn serialize<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        span: &Span,
        id: Option<SpanId>,
        kind: Option<String>,
    ) -> Option<SerializedSpan> {
        match self.try_serialize(tree, span, id, kind) {
            Ok(serialized) => Some(serialized),
            Err(SerializeError::Config(e)) => {
                log::error!("Skipping serialization, configuration error: {e}");
                None
            }
            Err(e) => {
                log::debug!("Span not serialized: {e}");
                None
            }
        }
    }

    pub fn try_serialize<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        span: &Span,
        id: Option<SpanId>,
        kind: Option<String>,
    ) -> Result<SerializedSpan, SerializeError> {
        if span.is_collapsed() {
            return Err(SerializeError::Collapsed);
        }
        let text = tree.span_text(span)?;
        if text.trim().is_empty() {
            return Err(SerializeError::EmptyText);
        }

        let scope = scope_root(tree, self.config)?;
        if !tree.is_inclusive_ancestor(scope, span.start.node)
            || !tree.is_inclusive_ancestor(scope, span.end.node)
        {
            return Err(SerializeError::OutOfScope {
                scope: self.config.scope_root.clone().unwrap_or_default(),
            });
        }

        let start_element = tree
            .parent(span.start.node)
            .ok_or(TreeError::Detached(span.start.node))?;
        let end_element = tree
            .parent(span.end.node)
            .ok_or(TreeError::Detached(span.end.node))?;
        let container = tree
            .common_ancestor(start_element, end_element)
            .ok_or(TreeError::Detached(span.start.node))?;

        let anchors = AnchorPair {
            start: self.end_anchor(tree, span.start, scope),
            end: self.end_anchor(tree, span.end, scope),
        };
        let paths = PathPair {
            start: end_path(tree, start_element, span.start)?,
            end: end_path(tree, end_element, span.end)?,
        };
        let multiple_anchors = self.multi_anchor(tree, span, start_element, end_element, container)?;
        let fingerprint =
            structural_fingerprint(tree, container, &self.excluded(), self.chain_depth);
        let context = self.context(tree, span, container, start_element != end_element)?;

        Ok(SerializedSpan {
            id: id.unwrap_or_else(SpanId::generate),
            text,
            kind,
            restore: RestoreData {
                anchors,
                paths,
                multiple_anchors,
                fingerprint,
                context,
            },
            runtime: None,
        })
    }

    fn excluded(&self) -> Vec<&str> {
        let mut excluded = vec!["id", "class", "style"];
        if let Some(custom) = &self.config.custom_id_attribute {
            excluded.push(custom.as_str());
        }
        excluded
    }

    /// Walk up from the boundary to the first element with an acceptable
    /// stable identifier, stopping at the scope root
    fn end_anchor<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        boundary: Boundary,
        scope: NodeId,
    ) -> Option<EndAnchor> {
        let mut current = tree.parent(boundary.node);
        while let Some(element) = current {
            let mut names: Vec<&str> = Vec::with_capacity(2);
            if let Some(custom) = &self.config.custom_id_attribute {
                names.push(custom.as_str());
            }
            names.push("id");
            for name in names {
                if let Some(value) = tree.attribute(element, name) {
                    if self.filter.accept(value) {
                        let offset = tree.offset_within(element, boundary)?;
                        return Some(EndAnchor {
                            attribute: name.to_string(),
                            value: value.to_string(),
                            offset,
                        });
                    }
                    log::trace!("Skipping volatile {name}=\"{value}\"");
                }
            }
            if element == scope {
                break;
            }
            current = tree.parent(element);
        }
        None
    }

    fn multi_anchor<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        span: &Span,
        start_element: NodeId,
        end_element: NodeId,
        container: NodeId,
    ) -> Result<MultiAnchorData, SerializeError> {
        let excluded = self.excluded();
        let common_ancestor =
            ElementPath::of(tree, container).ok_or(TreeError::Detached(container))?;
        let ancestor_distance = tree.depth(start_element) - tree.depth(container);
        let start_offset = tree
            .offset_within(start_element, span.start)
            .ok_or(TreeError::Detached(span.start.node))?;
        let sibling_index = tree
            .parent(start_element)
            .map(|parent| {
                tree.element_children(parent)
                    .iter()
                    .position(|&c| c == start_element)
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        Ok(MultiAnchorData {
            start: element_signature(tree, start_element, &excluded),
            end: element_signature(tree, end_element, &excluded),
            common_ancestor,
            ancestor_distance,
            start_offset,
            sibling_index,
            sibling_pattern: sibling_pattern(tree, start_element),
        })
    }

    fn context<T: TreeAdapter + ?Sized>(
        &self,
        tree: &T,
        span: &Span,
        container: NodeId,
        cross_element: bool,
    ) -> Result<TextContext, SerializeError> {
        let full = tree.text_content(container);
        let start = tree
            .offset_within(container, span.start)
            .ok_or(TreeError::Detached(span.start.node))?;
        let end = tree
            .offset_within(container, span.end)
            .ok_or(TreeError::Detached(span.end.node))?;
        let len = full.chars().count();
        Ok(TextContext {
            preceding: take_last_chars(&char_slice(&full, 0, start), self.config.context_length),
            following: char_slice(&full, end, (end + self.config.context_length).min(len)),
            parent_offset: start,
            parent_text: take_chars(&full, self.config.parent_text_length),
            cross_element,
        })
    }
}

fn end_path<T: TreeAdapter + ?Sized>(
    tree: &T,
    element: NodeId,
    boundary: Boundary,
) -> Result<EndPath, SerializeError> {
    let path = ElementPath::of(tree, element).ok_or(TreeError::Detached(element))?;
    let text_offset = tree
        .offset_within(element, boundary)
        .ok_or(TreeError::Detached(boundary.node))?;
    let leaf_index = tree
        .text_leaves(element)
        .iter()
        .position(|&leaf| leaf == boundary.node)
        .unwrap_or(0);
    Ok(EndPath {
        path,
        text_offset,
        leaf_index,
        leaf_offset: boundary.offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::filter::{AcceptAll, VolatileIdFilter};
    use crate::tree::Document;
    use pretty_assertions::assert_eq;

    fn fixture() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let article = doc.append_element(root, "article", &[("id", "post"), ("class", "post post--featured")]);
        let p = doc.append_element(article, "p", &[("class", "post__body"), ("data-role", "lead")]);
        let first = doc.append_text(p, "Rust makes systems programming ");
        let strong = doc.append_element(p, "strong", &[]);
        let second = doc.append_text(strong, "approachable and safe");
        (doc, first, second)
    }

    #[test]
    fn test_serialize_single_leaf() {
        let (doc, first, _) = fixture();
        let config = AnchorConfig::default();
        let serializer = Serializer::new(&config, &AcceptAll);
        let span = Span::within(first, 5, 10);

        let saved = serializer
            .serialize(&doc, &span, Some(SpanId::from("s1")), Some("note".to_string()))
            .unwrap();

        assert_eq!(saved.id, SpanId::from("s1"));
        assert_eq!(saved.text, "makes");
        assert_eq!(saved.kind.as_deref(), Some("note"));
        assert_eq!(
            saved.restore.anchors.start,
            Some(EndAnchor {
                attribute: "id".to_string(),
                value: "post".to_string(),
                offset: 5,
            })
        );
        assert_eq!(saved.restore.paths.start.path.to_string(), "article#post.post.post--featured:nth-of-type(1) > p.post__body:nth-of-type(1)");
        assert_eq!(saved.restore.paths.end.text_offset, 10);
        assert!(!saved.restore.context.cross_element);
        assert_eq!(saved.restore.context.preceding, "Rust ");
        assert_eq!(saved.restore.fingerprint.tag, "p");
        assert_eq!(
            saved.restore.multiple_anchors.start.attributes.get("data-role").map(String::as_str),
            Some("lead")
        );
    }

    #[test]
    fn test_serialize_cross_element() {
        let (doc, first, second) = fixture();
        let config = AnchorConfig::default();
        let serializer = Serializer::new(&config, &AcceptAll);
        let span = Span::new(Boundary::new(first, 19), Boundary::new(second, 12));

        let saved = serializer.serialize(&doc, &span, None, None).unwrap();

        assert_eq!(saved.text, "programming approachable");
        assert!(saved.restore.context.cross_element);
        assert_eq!(saved.restore.multiple_anchors.start.tag, "p");
        assert_eq!(saved.restore.multiple_anchors.end.tag, "strong");
        assert_eq!(saved.restore.multiple_anchors.ancestor_distance, 0);
        assert_eq!(saved.restore.fingerprint.tag, "p");
        assert_eq!(saved.restore.anchors.end.as_ref().map(|a| a.offset), Some(43));
        assert!(!saved.id.as_str().is_empty());
    }

    #[test]
    fn test_collapsed_span_is_rejected() {
        let (doc, first, _) = fixture();
        let config = AnchorConfig::default();
        let serializer = Serializer::new(&config, &AcceptAll);
        let span = Span::within(first, 3, 3);

        assert_eq!(
            serializer.try_serialize(&doc, &span, None, None),
            Err(SerializeError::Collapsed)
        );
        assert!(serializer.serialize(&doc, &span, None, None).is_none());
    }

    #[test]
    fn test_whitespace_span_is_empty() {
        let (doc, first, _) = fixture();
        let config = AnchorConfig::default();
        let serializer = Serializer::new(&config, &AcceptAll);
        let span = Span::within(first, 4, 5);

        assert_eq!(
            serializer.try_serialize(&doc, &span, None, None),
            Err(SerializeError::EmptyText)
        );
    }

    #[test]
    fn test_volatile_id_skipped_for_stable_ancestor() {
        let mut doc = Document::new();
        let root = doc.root();
        let section = doc.append_element(root, "section", &[("id", "chapter-1")]);
        let div = doc.append_element(section, "div", &[("id", "ember1234")]);
        let text = doc.append_text(div, "volatile wrapper");
        let config = AnchorConfig::default();
        let filter = VolatileIdFilter::from_config(&config).unwrap();
        let serializer = Serializer::new(&config, &filter);

        let saved = serializer
            .serialize(&doc, &Span::within(text, 0, 8), None, None)
            .unwrap();

        assert_eq!(saved.restore.anchors.start.unwrap().value, "chapter-1");
    }

    #[test]
    fn test_custom_attribute_preferred() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[("id", "plain"), ("data-anchor", "stable")]);
        let text = doc.append_text(div, "custom anchors");
        let config = AnchorConfig {
            custom_id_attribute: Some("data-anchor".to_string()),
            ..AnchorConfig::default()
        };
        let serializer = Serializer::new(&config, &AcceptAll);

        let saved = serializer
            .serialize(&doc, &Span::within(text, 0, 6), None, None)
            .unwrap();
        let anchor = saved.restore.anchors.start.unwrap();

        assert_eq!(anchor.attribute, "data-anchor");
        assert_eq!(anchor.value, "stable");
        assert!(!saved.restore.fingerprint.attributes.contains_key("data-anchor"));
    }

    #[test]
    fn test_out_of_scope_span() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_element(root, "main", &[("id", "content")]);
        let aside = doc.append_element(root, "aside", &[]);
        let text = doc.append_text(aside, "sidebar text");
        let config = AnchorConfig {
            scope_root: Some("content".to_string()),
            ..AnchorConfig::default()
        };
        let serializer = Serializer::new(&config, &AcceptAll);

        let result = serializer.try_serialize(&doc, &Span::within(text, 0, 7), None, None);
        assert_eq!(
            result,
            Err(SerializeError::OutOfScope {
                scope: "content".to_string()
            })
        );
    }

    #[test]
    fn test_missing_scope_root_is_config_error() {
        let (doc, first, _) = fixture();
        let config = AnchorConfig {
            scope_root: Some("missing".to_string()),
            ..AnchorConfig::default()
        };
        let serializer = Serializer::new(&config, &AcceptAll);

        let result = serializer.try_serialize(&doc, &Span::within(first, 0, 4), None, None);
        assert_eq!(
            result,
            Err(SerializeError::Config(ConfigError::MissingScopeRoot(
                "missing".to_string()
            )))
        );
    }

    #[test]
    fn test_wire_form_omits_runtime() {
        let (doc, first, _) = fixture();
        let config = AnchorConfig::default();
        let serializer = Serializer::new(&config, &AcceptAll);
        let mut saved = serializer
            .serialize(&doc, &Span::within(first, 0, 4), Some("w".into()), None)
            .unwrap();
        saved.runtime = Some(crate::anchoring::model::RuntimeStatus {
            restored: true,
            layer: crate::anchoring::restore::Layer::Anchor,
        });

        let json = saved.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("runtime").is_none());
        assert!(value.get("type").is_none());
        assert!(value["restore"].get("multipleAnchors").is_some());

        let back = SerializedSpan::from_json(&json).unwrap();
        assert_eq!(back.runtime, None);
        assert_eq!(back.restore, saved.restore);
    }
}
