use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, Rect, TreeAdapter};

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Option<Rect>,
}

/// Arena-backed in-memory document tree.
///
/// Nodes are never freed: removing a node detaches it from its parent, so
/// stale [`NodeId`]s stay valid handles that simply report as disconnected.
/// Every mutation bumps [`Document::version`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    scroll: (f64, f64),
    version: u64,
}

/// JSON fixture form of a document subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    TextBox {
        text: String,
        rect: Rect,
    },
    Element {
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<NodeSpec>,
        #[serde(default)]
        rect: Option<Rect>,
    },
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a `body` root element
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Element {
                    tag: "body".to_string(),
                    attrs: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
                rect: None,
            }],
            root: NodeId(0),
            scroll: (0.0, 0.0),
            version: 0,
        }
    }

    /// Build a document from a root [`NodeSpec`]; the spec must be an element
    pub fn from_spec(spec: &NodeSpec) -> anyhow::Result<Self> {
        let NodeSpec::Element {
            tag,
            attrs,
            children,
            rect,
        } = spec
        else {
            anyhow::bail!("document root must be an element");
        };
        let mut doc = Self::new();
        let root = doc.root;
        if let NodeKind::Element {
            tag: root_tag,
            attrs: root_attrs,
        } = &mut doc.nodes[root.0].kind
        {
            *root_tag = tag.to_ascii_lowercase();
            *root_attrs = attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        }
        doc.nodes[root.0].rect = *rect;
        for child in children {
            doc.append_spec(root, child);
        }
        doc.version = 0;
        Ok(doc)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let spec: NodeSpec = serde_json::from_str(json)?;
        Self::from_spec(&spec)
    }

    /// Append a [`NodeSpec`] subtree under `parent`
    pub fn append_spec(&mut self, parent: NodeId, spec: &NodeSpec) -> NodeId {
        match spec {
            NodeSpec::Text(text) => self.append_text(parent, text),
            NodeSpec::TextBox { text, rect } => {
                let node = self.append_text(parent, text);
                self.set_rect(node, *rect);
                node
            }
            NodeSpec::Element {
                tag,
                attrs,
                children,
                rect,
            } => {
                let pairs: Vec<(&str, &str)> =
                    attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                let node = self.append_element(parent, tag, &pairs);
                if let Some(rect) = rect {
                    self.set_rect(node, *rect);
                }
                for child in children {
                    self.append_spec(node, child);
                }
                node
            }
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            rect: None,
        });
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    /// Create a detached text leaf
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.version += 1;
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(tag, attrs);
        self.append_child(parent, node);
        node
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = self.create_text(text);
        self.append_child(parent, node);
        node
    }

    /// Insert `child` into `parent` at child position `index` (clamped)
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.version += 1;
    }

    /// Insert `child` right before `reference` under the same parent
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) {
        let Some(parent) = self.nodes[reference.0].parent else {
            return;
        };
        self.detach(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == reference)
            .unwrap_or(0);
        self.insert_child(parent, index, child);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    /// Detach `node` (and its subtree) from the document
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        self.version += 1;
    }

    /// Replace `node` in its parent by a new element that contains it
    pub fn wrap(&mut self, node: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let wrapper = self.create_element(tag, attrs);
        if let Some(parent) = self.nodes[node.0].parent {
            let index = self.nodes[parent.0]
                .children
                .iter()
                .position(|&c| c == node)
                .unwrap_or(0);
            self.insert_child(parent, index, wrapper);
        }
        self.append_child(wrapper, node);
        wrapper
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
            self.version += 1;
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            attrs.retain(|(k, _)| k != name);
            self.version += 1;
        }
    }

    pub fn set_tag(&mut self, node: NodeId, tag: &str) {
        if let NodeKind::Element { tag: current, .. } = &mut self.nodes[node.0].kind {
            *current = tag.to_ascii_lowercase();
            self.version += 1;
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeKind::Text(current) = &mut self.nodes[node.0].kind {
            *current = text.to_string();
            self.version += 1;
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = Some(rect);
        self.version += 1;
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.scroll = (x, y);
    }
}

impl TreeAdapter for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute_names(&self, node: NodeId) -> Vec<&str> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element { attrs, .. }) => attrs.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    fn layout_rect(&self, node: NodeId) -> Option<Rect> {
        self.nodes.get(node.0).and_then(|n| n.rect)
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }
}
